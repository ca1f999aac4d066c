//! Schema types for source units, resolved tasks, intents, and reports.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reference back to the original statement or graph element.
///
/// `position` is the zero-based index in the parsed sequence (post
/// topological sort for graph nodes), which downstream ordering relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRef {
    pub position: usize,
    pub line: Option<u64>,
    pub node_id: Option<String>,
}

impl fmt::Display for UnitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(node_id) = &self.node_id {
            write!(f, "node {node_id}")
        } else if let Some(line) = self.line {
            write!(f, "line {line}")
        } else {
            write!(f, "unit {}", self.position)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Statement,
    GraphNode,
}

/// A named parameter value as written in the source.
///
/// Variable references keep the referenced name so the mapping engine can
/// re-emit them in target templating syntax instead of guessing a literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Literal(String),
    VarRef(String),
}

impl ParamValue {
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            ParamValue::Literal(value) => Some(value),
            ParamValue::VarRef(_) => None,
        }
    }
}

/// One parsed statement or workflow-graph node.
///
/// Immutable once parsed; corrections happen by re-parsing, not by editing
/// units in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceUnit {
    pub reference: UnitRef,
    pub kind: UnitKind,
    pub raw: String,
    pub ident: Option<String>,
    pub params: BTreeMap<String, ParamValue>,
}

/// Fixed category assigned to every SourceUnit before mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Context,
    Lookup,
    Mutation,
    Integration,
    Gate,
    Unknown,
}

impl Classification {
    /// Key used to select the mapping sub-table for this category.
    pub fn table_key(self) -> &'static str {
        match self {
            Classification::Context => "context",
            Classification::Lookup => "lookup",
            Classification::Mutation => "mutation",
            Classification::Integration => "integration",
            Classification::Gate => "gate",
            Classification::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Resolved,
    Blocked,
}

/// A target task produced by the mapping engine and profile resolver.
///
/// Blocked tasks carry remediation text and are emitted downstream as
/// labeled placeholders; they are never dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedTask {
    pub unit: UnitRef,
    pub description: String,
    pub action: String,
    pub params: BTreeMap<String, String>,
    pub status: TaskStatus,
    pub blocked_reason: Option<String>,
}

/// An input declared by a source document (workflow `<input>` elements).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredInput {
    pub name: String,
    pub input_type: String,
    pub default: Option<String>,
}

/// Requirement metadata extracted per source, merged with fixed per-field
/// strategies: numeric fields take the maximum, boolean flags combine with
/// logical OR, identifier fields require equality or surface a conflict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    pub cpu_count: Option<u64>,
    pub memory_gb: Option<u64>,
    pub disk_gb: Option<u64>,
    pub approval_required: Option<bool>,
    pub backup_required: Option<bool>,
    pub target_network: Option<String>,
    pub target_cluster: Option<String>,
}

impl Requirements {
    pub const FIELDS: &'static [&'static str] = &[
        "cpu_count",
        "memory_gb",
        "disk_gb",
        "approval_required",
        "backup_required",
        "target_network",
        "target_cluster",
    ];

    pub fn is_known_field(field: &str) -> bool {
        Self::FIELDS.contains(&field)
    }

    /// Record a declared value for one field, parsed per field type.
    ///
    /// Numeric fields keep the maximum and boolean fields OR with any value
    /// already declared by the same source, matching the merge strategies,
    /// so declaring within one source is itself order-independent.
    pub fn declare(&mut self, field: &str, value: &str) -> anyhow::Result<()> {
        use anyhow::Context;
        match field {
            "cpu_count" => {
                let parsed: u64 = value
                    .trim()
                    .parse()
                    .with_context(|| format!("cpu_count value \"{value}\" is not numeric"))?;
                self.cpu_count = Some(self.cpu_count.map_or(parsed, |cur| cur.max(parsed)));
            }
            "memory_gb" => {
                let parsed: u64 = value
                    .trim()
                    .parse()
                    .with_context(|| format!("memory_gb value \"{value}\" is not numeric"))?;
                self.memory_gb = Some(self.memory_gb.map_or(parsed, |cur| cur.max(parsed)));
            }
            "disk_gb" => {
                let parsed: u64 = value
                    .trim()
                    .parse()
                    .with_context(|| format!("disk_gb value \"{value}\" is not numeric"))?;
                self.disk_gb = Some(self.disk_gb.map_or(parsed, |cur| cur.max(parsed)));
            }
            "approval_required" => {
                let parsed = parse_bool(value)
                    .with_context(|| format!("approval_required value \"{value}\""))?;
                self.approval_required = Some(self.approval_required.unwrap_or(false) || parsed);
            }
            "backup_required" => {
                let parsed = parse_bool(value)
                    .with_context(|| format!("backup_required value \"{value}\""))?;
                self.backup_required = Some(self.backup_required.unwrap_or(false) || parsed);
            }
            "target_network" => {
                self.target_network = Some(value.trim().to_string());
            }
            "target_cluster" => {
                self.target_cluster = Some(value.trim().to_string());
            }
            other => anyhow::bail!("unknown requirement field \"{other}\""),
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => anyhow::bail!("\"{other}\" is not a boolean"),
    }
}

/// Why a unit ended up in the gap report instead of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GapReason {
    UnrecognizedUnit,
    NoMappingRule { category: Classification },
    MissingParameter { parameter: String },
}

/// One unit that could not be classified, mapped, or fully templated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapRecord {
    pub unit: UnitRef,
    pub reason: GapReason,
    pub raw_excerpt: String,
    pub remediation: String,
}

/// The full resolved output for one imported source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceIntent {
    pub source_path: String,
    pub kind: UnitKind,
    pub tasks: Vec<ResolvedTask>,
    pub inputs: Vec<DeclaredInput>,
    /// Names the source declares as produced values (workflow `<output>`
    /// elements); scripts declare none.
    pub outputs: Vec<String>,
    pub requirements: Requirements,
    pub gaps: Vec<GapRecord>,
}

/// One value that participated in a merge conflict, tagged with its origin.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConflictValue {
    pub source_path: String,
    pub value: String,
}

/// An irreconcilable field difference discovered during merge.
///
/// Values are sorted by source path so the same conflict set serializes
/// identically regardless of merge order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub field: String,
    pub values: Vec<ConflictValue>,
    pub remediation: String,
}

/// Tasks contributed by one source, kept grouped so the external emitter
/// never sees an invented interleave across unrelated sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceTasks {
    pub source_path: String,
    pub tasks: Vec<ResolvedTask>,
}

/// The reconciled combination of multiple SourceIntents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedIntent {
    pub sources: Vec<SourceTasks>,
    pub inputs: Vec<DeclaredInput>,
    /// Sorted union of the declared output names across sources.
    pub outputs: Vec<String>,
    pub requirements: Requirements,
    pub conflicts: Vec<ConflictRecord>,
    pub gaps: Vec<SourceGap>,
}

impl MergedIntent {
    /// A merged intent with conflicts is valid but flagged; final emission
    /// requires the caller to acknowledge it explicitly.
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// A gap carried into the merged intent, tagged with its source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceGap {
    pub source_path: String,
    #[serde(flatten)]
    pub gap: GapRecord,
}
