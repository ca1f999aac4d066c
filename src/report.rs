//! Structured gap/conflict report for operator review.
//!
//! Collects everything the pipeline could not translate cleanly: unknown
//! units, unmatched mappings, blocked tasks, merge conflicts, and skipped
//! files, each with enough context to act on without reading this crate.

use crate::schema::{ConflictRecord, MergedIntent, SourceIntent, TaskStatus, UnitRef};
use crate::translate::SkippedSource;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ReportGap {
    pub source_path: String,
    pub unit: UnitRef,
    pub reason: String,
    pub raw_excerpt: String,
    pub remediation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportBlocked {
    pub source_path: String,
    pub unit: UnitRef,
    pub description: String,
    pub remediation: String,
}

/// Full translation report, serialized for the external reporting layer.
#[derive(Debug, Clone, Serialize)]
pub struct TranslationReport {
    pub gap_count: usize,
    pub blocked_count: usize,
    pub conflict_count: usize,
    pub skipped_count: usize,
    pub gaps: Vec<ReportGap>,
    pub blocked: Vec<ReportBlocked>,
    pub conflicts: Vec<ConflictRecord>,
    pub skipped: Vec<SkippedSource>,
}

/// Assemble the report from per-source intents and the merged result.
///
/// Entries are ordered by (source path, unit position) so successive runs
/// diff cleanly.
pub fn build_report(
    intents: &[SourceIntent],
    merged: &MergedIntent,
    skipped: &[SkippedSource],
) -> TranslationReport {
    let mut gaps = Vec::new();
    let mut blocked = Vec::new();

    for intent in intents {
        for gap in &intent.gaps {
            gaps.push(ReportGap {
                source_path: intent.source_path.clone(),
                unit: gap.unit.clone(),
                reason: gap_reason_label(&gap.reason),
                raw_excerpt: gap.raw_excerpt.clone(),
                remediation: gap.remediation.clone(),
            });
        }
        for task in &intent.tasks {
            if task.status != TaskStatus::Blocked {
                continue;
            }
            blocked.push(ReportBlocked {
                source_path: intent.source_path.clone(),
                unit: task.unit.clone(),
                description: task.description.clone(),
                remediation: task
                    .blocked_reason
                    .clone()
                    .unwrap_or_else(|| "blocked without recorded reason".to_string()),
            });
        }
    }

    gaps.sort_by(|a, b| (&a.source_path, a.unit.position).cmp(&(&b.source_path, b.unit.position)));
    blocked
        .sort_by(|a, b| (&a.source_path, a.unit.position).cmp(&(&b.source_path, b.unit.position)));

    let mut skipped = skipped.to_vec();
    skipped.sort_by(|a, b| a.source_path.cmp(&b.source_path));

    TranslationReport {
        gap_count: gaps.len(),
        blocked_count: blocked.len(),
        conflict_count: merged.conflicts.len(),
        skipped_count: skipped.len(),
        gaps,
        blocked,
        conflicts: merged.conflicts.clone(),
        skipped,
    }
}

fn gap_reason_label(reason: &crate::schema::GapReason) -> String {
    use crate::schema::GapReason;
    match reason {
        GapReason::UnrecognizedUnit => "unrecognized_unit".to_string(),
        GapReason::NoMappingRule { category } => {
            format!("no_mapping_rule ({})", category.table_key())
        }
        GapReason::MissingParameter { parameter } => {
            format!("missing_parameter ({parameter})")
        }
    }
}
