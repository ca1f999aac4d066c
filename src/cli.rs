//! CLI argument parsing for the translation pipeline.
//!
//! The CLI is intentionally thin: it locates files and loads configuration,
//! then hands everything to the pure core, so the same pipeline can be
//! driven from tests or another front end.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint for the translation pipeline.
#[derive(Parser, Debug)]
#[command(
    name = "ibridge",
    version,
    about = "Translate provisioning scripts and workflow graphs into config-management intent",
    after_help = "Examples:\n  ibridge rules init --out rules.json\n  ibridge translate --script provision.ps1 --workflow flow.xml --rules rules.json --profile prod.json --out-dir out/\n  ibridge merge --intent out/provision.intent.json --intent out/flow.intent.json --out merged.json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Translate(TranslateArgs),
    Merge(MergeArgs),
    #[command(subcommand)]
    Rules(RulesCommand),
}

/// Translate command inputs for a full run over one or more sources.
#[derive(Parser, Debug)]
#[command(about = "Translate sources and write per-source, merged, and report artifacts")]
pub struct TranslateArgs {
    /// Provisioning script to translate (repeatable)
    #[arg(long, value_name = "FILE")]
    pub script: Vec<PathBuf>,

    /// XML workflow export to translate (repeatable)
    #[arg(long, value_name = "FILE")]
    pub workflow: Vec<PathBuf>,

    /// Mapping rule table (JSON)
    #[arg(long, value_name = "FILE")]
    pub rules: PathBuf,

    /// Environment profile (JSON); omit to resolve against an empty profile
    #[arg(long, value_name = "FILE")]
    pub profile: Option<PathBuf>,

    /// Directory for intent and report artifacts
    #[arg(long, value_name = "DIR")]
    pub out_dir: PathBuf,

    /// Proceed (exit 0) even when the merged intent carries conflicts
    #[arg(long)]
    pub acknowledge_conflicts: bool,

    /// Resolve duplicate input definitions by import order instead of
    /// lexicographic source path
    #[arg(long)]
    pub import_order_inputs: bool,
}

/// Merge command inputs for combining previously written intents.
#[derive(Parser, Debug)]
#[command(about = "Merge per-source intent files into one merged intent")]
pub struct MergeArgs {
    /// Per-source intent JSON produced by `translate` (repeatable)
    #[arg(long, value_name = "FILE", required = true)]
    pub intent: Vec<PathBuf>,

    /// Output path for the merged intent
    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,

    /// Proceed (exit 0) even when the merged intent carries conflicts
    #[arg(long)]
    pub acknowledge_conflicts: bool,

    /// Resolve duplicate input definitions by import order instead of
    /// lexicographic source path
    #[arg(long)]
    pub import_order_inputs: bool,
}

/// Rule-table maintenance commands.
#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// Write a starter rule table to edit and version
    Init(RulesInitArgs),
}

#[derive(Parser, Debug)]
pub struct RulesInitArgs {
    /// Output path for the starter table
    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}
