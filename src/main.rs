use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Command, MergeArgs, RootArgs, RulesCommand, RulesInitArgs, TranslateArgs};
use intent_bridge::merge::{merge_intents, InputPrecedence};
use intent_bridge::output::write_json;
use intent_bridge::report::build_report;
use intent_bridge::rules::load_rules;
use intent_bridge::schema::SourceIntent;
use intent_bridge::templates;
use intent_bridge::translate::{translate_run, SourceFile, SourceFormat};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = RootArgs::parse();
    match args.command {
        Command::Translate(args) => run_translate(args),
        Command::Merge(args) => run_merge(args),
        Command::Rules(RulesCommand::Init(args)) => run_rules_init(args),
    }
}

fn run_translate(args: TranslateArgs) -> Result<()> {
    if args.script.is_empty() && args.workflow.is_empty() {
        bail!("nothing to translate: pass at least one --script or --workflow");
    }

    let rules = load_rules(&args.rules)?;
    let profile = load_profile(args.profile.as_deref())?;

    let mut sources = Vec::new();
    for path in &args.script {
        sources.push(SourceFile {
            path: path.clone(),
            format: SourceFormat::Script,
        });
    }
    for path in &args.workflow {
        sources.push(SourceFile {
            path: path.clone(),
            format: SourceFormat::Workflow,
        });
    }

    let outcome = translate_run(&sources, &rules, &profile);

    let file_names = intent_file_names(&outcome.intents)?;
    for (intent, file_name) in outcome.intents.iter().zip(&file_names) {
        write_json(&args.out_dir.join(file_name), intent)?;
    }

    let precedence = input_precedence(args.import_order_inputs);
    let merged = merge_intents(&outcome.intents, precedence);
    write_json(&args.out_dir.join("merged.intent.json"), &merged)?;

    let report = build_report(&outcome.intents, &merged, &outcome.skipped);
    write_json(&args.out_dir.join("report.json"), &report)?;

    println!(
        "translated {} source(s), skipped {}; {} gap(s), {} blocked, {} conflict(s)",
        outcome.intents.len(),
        outcome.skipped.len(),
        report.gap_count,
        report.blocked_count,
        report.conflict_count,
    );

    gate_on_conflicts(merged.has_conflicts(), args.acknowledge_conflicts)
}

fn run_merge(args: MergeArgs) -> Result<()> {
    let mut intents = Vec::with_capacity(args.intent.len());
    for path in &args.intent {
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let intent: SourceIntent = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse intent {}", path.display()))?;
        intents.push(intent);
    }

    let merged = merge_intents(&intents, input_precedence(args.import_order_inputs));
    write_json(&args.out, &merged)?;

    println!(
        "merged {} intent(s); {} conflict(s)",
        intents.len(),
        merged.conflicts.len()
    );

    gate_on_conflicts(merged.has_conflicts(), args.acknowledge_conflicts)
}

fn run_rules_init(args: RulesInitArgs) -> Result<()> {
    if args.out.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite",
            args.out.display()
        );
    }
    if let Some(parent) = args.out.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
    }
    fs::write(&args.out, templates::STARTER_RULES_JSON)
        .with_context(|| format!("write {}", args.out.display()))?;
    println!("wrote starter rule table to {}", args.out.display());
    Ok(())
}

fn load_profile(path: Option<&Path>) -> Result<Value> {
    let Some(path) = path else {
        return Ok(Value::Object(serde_json::Map::new()));
    };
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse profile {}", path.display()))
}

fn input_precedence(import_order: bool) -> InputPrecedence {
    if import_order {
        InputPrecedence::ImportOrder
    } else {
        InputPrecedence::SourcePath
    }
}

/// A merged intent with conflicts is still written, but consuming it for
/// emission requires the caller's explicit acknowledgement.
fn gate_on_conflicts(has_conflicts: bool, acknowledged: bool) -> Result<()> {
    if has_conflicts && !acknowledged {
        bail!(
            "merged intent carries conflicts; review report.json and re-run with \
             --acknowledge-conflicts to proceed"
        );
    }
    Ok(())
}

/// `out/provision.ps1` becomes `provision.ps1.intent.json`; the source
/// extension stays so a script and a workflow sharing a stem never collide.
/// When two sources share a file name, the full path is flattened into the
/// artifact name so neither intent overwrites the other.
fn intent_file_names(intents: &[SourceIntent]) -> Result<Vec<String>> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for intent in intents {
        *counts.entry(source_file_name(&intent.source_path)).or_insert(0) += 1;
    }

    let names: Vec<String> = intents
        .iter()
        .map(|intent| {
            let name = source_file_name(&intent.source_path);
            if counts.get(&name).copied().unwrap_or(0) > 1 {
                format!("{}.intent.json", flatten_source_path(&intent.source_path))
            } else {
                format!("{name}.intent.json")
            }
        })
        .collect();

    let distinct: BTreeSet<&String> = names.iter().collect();
    if distinct.len() != names.len() {
        bail!("per-source intent artifact names collide even after flattening; rename the sources or translate them in separate runs");
    }
    Ok(names)
}

fn source_file_name(source_path: &str) -> String {
    Path::new(source_path)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "source".to_string())
}

fn flatten_source_path(source_path: &str) -> String {
    source_path
        .chars()
        .map(|ch| {
            if std::path::is_separator(ch) || ch == ':' {
                '_'
            } else {
                ch
            }
        })
        .collect::<String>()
        .trim_start_matches('_')
        .to_string()
}
