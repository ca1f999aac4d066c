//! Per-file translation pipeline and the parallel run driver.
//!
//! One source document translates as a pure function of (text, rule table,
//! profile): parse, order (graphs only), classify, map, resolve. Files are
//! independent, so the run driver fans out with rayon and synchronizes only
//! at the merge stage. A structural failure in one file is recorded as a
//! skip and never fails the run.

use crate::classify::classify;
use crate::mapping::{map_unit, MapOutcome};
use crate::order::order_units;
use crate::profile::resolve_task;
use crate::rules::RuleTable;
use crate::schema::{
    Classification, GapReason, GapRecord, Requirements, SourceIntent, SourceUnit, UnitKind,
};
use crate::script::parse_script;
use crate::workflow::parse_workflow;
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Source document format, decided by the caller (the CLI layer knows which
/// flag the path arrived under; the core does no discovery).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Script,
    Workflow,
}

/// One file queued for translation.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub format: SourceFormat,
}

/// A file excluded from the run, with the structural error that excluded it.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedSource {
    pub source_path: String,
    pub error: String,
}

/// Result of translating a set of files.
#[derive(Debug)]
pub struct RunOutcome {
    pub intents: Vec<SourceIntent>,
    pub skipped: Vec<SkippedSource>,
}

/// Translate one script. Never fails: malformed lines degrade to gaps.
pub fn translate_script_source(
    source_path: &str,
    content: &str,
    rules: &RuleTable,
    profile: &Value,
) -> SourceIntent {
    let units = parse_script(content);
    let mut intent = empty_intent(source_path, UnitKind::Statement);
    translate_units(&units, rules, profile, &mut intent);
    intent
}

/// Translate one workflow document. Unparseable XML or a dependency cycle
/// fails this document only.
pub fn translate_workflow_source(
    source_path: &str,
    content: &str,
    rules: &RuleTable,
    profile: &Value,
) -> Result<SourceIntent> {
    let doc = parse_workflow(content)?;
    let ordered = order_units(doc.units, &doc.edges)?;

    let mut intent = empty_intent(source_path, UnitKind::GraphNode);
    intent.inputs = doc.inputs;
    intent.outputs = doc.outputs;

    // Numeric and boolean input defaults that name a requirement field feed
    // the sizing strategies directly.
    for input in &intent.inputs {
        let Some(default) = input.default.as_deref() else {
            continue;
        };
        if Requirements::is_known_field(&input.name) {
            if let Err(error) = intent.requirements.declare(&input.name, default) {
                tracing::debug!(input = %input.name, %error, "input default not usable");
            }
        }
    }

    translate_units(&ordered, rules, profile, &mut intent);
    Ok(intent)
}

fn empty_intent(source_path: &str, kind: UnitKind) -> SourceIntent {
    SourceIntent {
        source_path: source_path.to_string(),
        kind,
        tasks: Vec::new(),
        inputs: Vec::new(),
        outputs: Vec::new(),
        requirements: Requirements::default(),
        gaps: Vec::new(),
    }
}

/// Classify, map, and resolve an ordered unit sequence.
///
/// Conservation: every unit lands in exactly one of tasks (resolved or
/// blocked) or gaps.
fn translate_units(
    units: &[SourceUnit],
    rules: &RuleTable,
    profile: &Value,
    intent: &mut SourceIntent,
) {
    for unit in units {
        let category = classify(unit);
        if category == Classification::Unknown {
            intent.gaps.push(GapRecord {
                unit: unit.reference.clone(),
                reason: GapReason::UnrecognizedUnit,
                raw_excerpt: unit.raw.clone(),
                remediation: "This unit matches no recognized statement shape or verb. \
                              Translate it by hand, or fix the source if it was \
                              mis-exported."
                    .to_string(),
            });
            continue;
        }

        match map_unit(unit, category, rules, &mut intent.requirements) {
            MapOutcome::Task(pending) => intent.tasks.push(resolve_task(pending, profile)),
            MapOutcome::Gap(gap) => intent.gaps.push(gap),
        }
    }
}

/// Translate all files in parallel. Parsing, classification, mapping, and
/// resolution touch no shared mutable state; the merger is the caller's
/// single synchronization point.
pub fn translate_run(sources: &[SourceFile], rules: &RuleTable, profile: &Value) -> RunOutcome {
    let results: Vec<std::result::Result<SourceIntent, SkippedSource>> = sources
        .par_iter()
        .map(|source| translate_file(source, rules, profile))
        .collect();

    let mut intents = Vec::new();
    let mut skipped = Vec::new();
    for result in results {
        match result {
            Ok(intent) => intents.push(intent),
            Err(skip) => skipped.push(skip),
        }
    }

    tracing::info!(
        translated = intents.len(),
        skipped = skipped.len(),
        "translation run complete"
    );

    RunOutcome { intents, skipped }
}

fn translate_file(
    source: &SourceFile,
    rules: &RuleTable,
    profile: &Value,
) -> std::result::Result<SourceIntent, SkippedSource> {
    let path_label = source.path.display().to_string();
    let result = read_and_translate(&source.path, source.format, rules, profile);
    match result {
        Ok(intent) => {
            tracing::debug!(
                source = %path_label,
                tasks = intent.tasks.len(),
                gaps = intent.gaps.len(),
                "translated source"
            );
            Ok(intent)
        }
        Err(error) => {
            tracing::warn!(source = %path_label, %error, "skipping source");
            Err(SkippedSource {
                source_path: path_label,
                error: format!("{error:#}"),
            })
        }
    }
}

fn read_and_translate(
    path: &Path,
    format: SourceFormat,
    rules: &RuleTable,
    profile: &Value,
) -> Result<SourceIntent> {
    let content =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let label = path.display().to_string();
    match format {
        SourceFormat::Script => Ok(translate_script_source(&label, &content, rules, profile)),
        SourceFormat::Workflow => translate_workflow_source(&label, &content, rules, profile),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TaskStatus;
    use crate::templates;
    use serde_json::json;

    fn starter_rules() -> RuleTable {
        serde_json::from_str(templates::STARTER_RULES_JSON).expect("starter table")
    }

    #[test]
    fn script_with_matching_rule_resolves_with_unit_suffix() {
        let intent = translate_script_source(
            "provision.ps1",
            "CreateVM(name=\"db01\", memoryGB=8)\n",
            &starter_rules(),
            &json!({}),
        );
        assert_eq!(intent.tasks.len(), 1);
        assert_eq!(intent.gaps.len(), 0);
        let task = &intent.tasks[0];
        assert_eq!(task.status, TaskStatus::Resolved);
        assert_eq!(task.params.get("memory").map(String::as_str), Some("8Gi"));
    }

    #[test]
    fn missing_profile_key_produces_blocked_task_naming_the_key() {
        let intent = translate_script_source(
            "attach.ps1",
            "AttachNetworkAdapter(vm=\"db01\", network=\"prod\")\n",
            &starter_rules(),
            &json!({}),
        );
        assert_eq!(intent.tasks.len(), 1);
        let task = &intent.tasks[0];
        assert_eq!(task.status, TaskStatus::Blocked);
        assert!(task
            .blocked_reason
            .as_deref()
            .is_some_and(|reason| reason.contains("network_security.model")));
    }

    #[test]
    fn unrecognized_line_is_a_gap_and_does_not_abort_the_file() {
        let script = "%%% not a statement\nCreateVM(name=\"a\", memoryGB=2)\n";
        let intent =
            translate_script_source("mixed.ps1", script, &starter_rules(), &json!({}));
        assert_eq!(intent.tasks.len(), 1);
        assert_eq!(intent.gaps.len(), 1);
        assert!(matches!(
            intent.gaps[0].reason,
            GapReason::UnrecognizedUnit
        ));
        assert_eq!(intent.gaps[0].raw_excerpt, "%%% not a statement");
    }

    #[test]
    fn unknown_verb_gap_does_not_blame_the_parser() {
        // The line parses cleanly; only the classifier rejects it.
        let intent = translate_script_source(
            "frob.ps1",
            "Frobnicate-Widget -Fast\n",
            &starter_rules(),
            &json!({}),
        );
        assert_eq!(intent.tasks.len(), 0);
        assert_eq!(intent.gaps.len(), 1);
        let gap = &intent.gaps[0];
        assert!(matches!(gap.reason, GapReason::UnrecognizedUnit));
        assert!(!gap.remediation.contains("parser"));
        assert!(gap.remediation.contains("Translate it by hand"));
    }

    #[test]
    fn every_unit_is_conserved_across_tasks_and_gaps() {
        let script = "\
$cluster = \"east\"\n\
CreateVM(name=\"db01\", memoryGB=8)\n\
Frobnicate-Widget -Fast\n\
%%%\n\
if ($err) { throw \"stop\" }\n";
        let intent =
            translate_script_source("conserve.ps1", script, &starter_rules(), &json!({}));
        assert_eq!(intent.tasks.len() + intent.gaps.len(), 5);
    }

    #[test]
    fn workflow_orders_nodes_before_translation() {
        // attach is declared before create but depends on it.
        let xml = r#"<workflow>
  <task id="attach" call="AttachNetworkAdapter">
    <param name="vm" value="db01"/>
    <param name="network" value="prod"/>
  </task>
  <task id="create" call="CreateVM">
    <param name="name" value="db01"/>
    <param name="memoryGB" value="8"/>
  </task>
  <link from="create" to="attach"/>
</workflow>"#;
        let profile = json!({"network_security": {"model": "strict"}});
        let intent =
            translate_workflow_source("flow.xml", xml, &starter_rules(), &profile)
                .expect("translate workflow");
        assert_eq!(intent.tasks.len(), 2);
        assert_eq!(intent.tasks[0].action, "cloud.vm");
        assert_eq!(intent.tasks[1].action, "cloud.vm_network");
        assert_eq!(intent.tasks[1].status, TaskStatus::Resolved);
    }

    #[test]
    fn workflow_input_defaults_feed_requirements() {
        let xml = r#"<workflow>
  <input name="cpu_count" type="number" default="4"/>
  <input name="vm_name"/>
</workflow>"#;
        let intent = translate_workflow_source("flow.xml", xml, &starter_rules(), &json!({}))
            .expect("translate workflow");
        assert_eq!(intent.requirements.cpu_count, Some(4));
        assert_eq!(intent.inputs.len(), 2);
    }

    #[test]
    fn workflow_output_declarations_are_carried_onto_the_intent() {
        let xml = r#"<workflow>
  <task id="create" call="CreateVM">
    <param name="name" value="db01"/>
    <param name="memoryGB" value="8"/>
  </task>
  <output name="vm_id"/>
  <output name="vm_address"/>
</workflow>"#;
        let intent = translate_workflow_source("flow.xml", xml, &starter_rules(), &json!({}))
            .expect("translate workflow");
        assert_eq!(
            intent.outputs,
            vec!["vm_id".to_string(), "vm_address".to_string()]
        );
    }

    #[test]
    fn cycle_fails_only_the_cyclic_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let good = dir.path().join("good.ps1");
        let bad = dir.path().join("bad.xml");
        fs::write(&good, "CreateVM(name=\"a\", memoryGB=2)\n").expect("write script");
        fs::write(
            &bad,
            r#"<workflow>
  <task id="a" call="CreateVM"><param name="name" value="x"/><param name="memoryGB" value="2"/></task>
  <task id="b" call="Start-VM"><param name="Name" value="x"/></task>
  <link from="a" to="b"/>
  <link from="b" to="a"/>
</workflow>"#,
        )
        .expect("write workflow");

        let sources = [
            SourceFile {
                path: good,
                format: SourceFormat::Script,
            },
            SourceFile {
                path: bad,
                format: SourceFormat::Workflow,
            },
        ];
        let outcome = translate_run(&sources, &starter_rules(), &json!({}));
        assert_eq!(outcome.intents.len(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.skipped[0].error.contains("cycle"));
    }

    #[test]
    fn repeated_runs_are_byte_identical() {
        let script = "CreateVM(name=\"db01\", memoryGB=8)\nNotifyTeam(channel=\"ops\")\n";
        let first = translate_script_source("det.ps1", script, &starter_rules(), &json!({}));
        let second = translate_script_source("det.ps1", script, &starter_rules(), &json!({}));
        let first_json = serde_json::to_string_pretty(&first).expect("serialize");
        let second_json = serde_json::to_string_pretty(&second).expect("serialize");
        assert_eq!(first_json, second_json);
    }
}
