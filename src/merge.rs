//! Multi-source intent merge with field-level conflict detection.
//!
//! Each field merges under a strategy fixed by its identity: declared
//! inputs union by name, scalar sizing fields take the maximum, governance
//! flags OR together, and identifier fields either agree or surface a
//! ConflictRecord with the field left unset. All strategies are commutative
//! and associative, so merging any permutation of the same sources yields
//! the same MergedIntent.

use crate::schema::{
    ConflictRecord, ConflictValue, DeclaredInput, MergedIntent, Requirements, SourceGap,
    SourceIntent, SourceTasks,
};
use std::collections::{BTreeMap, BTreeSet};

/// Which source wins the retained candidate when duplicate input names
/// carry differing definitions.
///
/// `SourcePath` (the default) keeps the merge fully permutation-invariant;
/// `ImportOrder` mirrors source systems where the first imported file wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputPrecedence {
    #[default]
    SourcePath,
    ImportOrder,
}

/// Merge N source intents into one unified representation.
pub fn merge_intents(intents: &[SourceIntent], precedence: InputPrecedence) -> MergedIntent {
    let ordered = ordered_refs(intents, precedence);

    let (inputs, mut conflicts) = merge_inputs(&ordered);
    let (requirements, requirement_conflicts) = merge_requirements(intents);
    conflicts.extend(requirement_conflicts);
    conflicts.sort_by(|a, b| (&a.field, &a.values).cmp(&(&b.field, &b.values)));

    let mut sources: Vec<SourceTasks> = intents
        .iter()
        .map(|intent| SourceTasks {
            source_path: intent.source_path.clone(),
            tasks: intent.tasks.clone(),
        })
        .collect();
    sources.sort_by(|a, b| a.source_path.cmp(&b.source_path));

    let mut gaps: Vec<SourceGap> = intents
        .iter()
        .flat_map(|intent| {
            intent.gaps.iter().map(|gap| SourceGap {
                source_path: intent.source_path.clone(),
                gap: gap.clone(),
            })
        })
        .collect();
    gaps.sort_by(|a, b| {
        (&a.source_path, a.gap.unit.position).cmp(&(&b.source_path, b.gap.unit.position))
    });

    // Output names union like inputs, but carry no type to conflict on.
    let outputs: BTreeSet<String> = intents
        .iter()
        .flat_map(|intent| intent.outputs.iter().cloned())
        .collect();

    MergedIntent {
        sources,
        inputs,
        outputs: outputs.into_iter().collect(),
        requirements,
        conflicts,
        gaps,
    }
}

/// Sources in candidate-precedence order.
fn ordered_refs(
    intents: &[SourceIntent],
    precedence: InputPrecedence,
) -> Vec<&SourceIntent> {
    let mut refs: Vec<&SourceIntent> = intents.iter().collect();
    if precedence == InputPrecedence::SourcePath {
        refs.sort_by(|a, b| a.source_path.cmp(&b.source_path));
    }
    refs
}

/// Union declared inputs by name.
///
/// Two declarations of the same name with different types are a conflict;
/// the first-seen definition (per precedence) stays as the union candidate.
/// Differing defaults alone are not a conflict: defaults feed the sizing
/// strategies instead.
fn merge_inputs(ordered: &[&SourceIntent]) -> (Vec<DeclaredInput>, Vec<ConflictRecord>) {
    let mut by_name: BTreeMap<String, DeclaredInput> = BTreeMap::new();
    let mut definitions: BTreeMap<String, BTreeSet<ConflictValue>> = BTreeMap::new();

    for intent in ordered {
        for input in &intent.inputs {
            by_name
                .entry(input.name.clone())
                .or_insert_with(|| input.clone());
            definitions
                .entry(input.name.clone())
                .or_default()
                .insert(ConflictValue {
                    source_path: intent.source_path.clone(),
                    value: input.input_type.clone(),
                });
        }
    }

    let conflicts = definitions
        .into_iter()
        .filter(|(_, values)| {
            let distinct: BTreeSet<&str> =
                values.iter().map(|value| value.value.as_str()).collect();
            distinct.len() > 1
        })
        .map(|(name, values)| ConflictRecord {
            field: format!("input.{name}"),
            values: values.into_iter().collect(),
            remediation: format!(
                "Input \"{name}\" is declared with different types across sources; \
                 align the declarations or rename one input. The first-seen \
                 definition was kept as the union candidate."
            ),
        })
        .collect();

    (by_name.into_values().collect(), conflicts)
}

fn merge_requirements(intents: &[SourceIntent]) -> (Requirements, Vec<ConflictRecord>) {
    let mut merged = Requirements::default();
    let mut conflicts = Vec::new();

    for intent in intents {
        let req = &intent.requirements;
        merged.cpu_count = max_option(merged.cpu_count, req.cpu_count);
        merged.memory_gb = max_option(merged.memory_gb, req.memory_gb);
        merged.disk_gb = max_option(merged.disk_gb, req.disk_gb);
        merged.approval_required = or_option(merged.approval_required, req.approval_required);
        merged.backup_required = or_option(merged.backup_required, req.backup_required);
    }

    merged.target_network = exclusive_value(
        intents,
        "target_network",
        |req| req.target_network.as_deref(),
        &mut conflicts,
    );
    merged.target_cluster = exclusive_value(
        intents,
        "target_cluster",
        |req| req.target_cluster.as_deref(),
        &mut conflicts,
    );

    (merged, conflicts)
}

fn max_option(current: Option<u64>, incoming: Option<u64>) -> Option<u64> {
    match (current, incoming) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (value, None) | (None, value) => value,
    }
}

/// Most-restrictive-wins: any source requiring the flag makes the merged
/// result require it.
fn or_option(current: Option<bool>, incoming: Option<bool>) -> Option<bool> {
    match (current, incoming) {
        (Some(a), Some(b)) => Some(a || b),
        (value, None) | (None, value) => value,
    }
}

/// Explicit-conflict strategy: equal values pass through, a mismatch
/// records both sides and leaves the merged field unset.
fn exclusive_value(
    intents: &[SourceIntent],
    field: &str,
    get: impl Fn(&Requirements) -> Option<&str>,
    conflicts: &mut Vec<ConflictRecord>,
) -> Option<String> {
    let mut values: BTreeSet<ConflictValue> = BTreeSet::new();
    for intent in intents {
        if let Some(value) = get(&intent.requirements) {
            values.insert(ConflictValue {
                source_path: intent.source_path.clone(),
                value: value.to_string(),
            });
        }
    }

    let distinct: BTreeSet<&str> = values.iter().map(|value| value.value.as_str()).collect();
    match distinct.len() {
        0 => None,
        1 => values.iter().next().map(|value| value.value.clone()),
        _ => {
            conflicts.push(ConflictRecord {
                field: field.to_string(),
                values: values.into_iter().collect(),
                remediation: format!(
                    "Sources declare different values for {field}; pick one, fix the \
                     sources or the rule table, and re-run. The merged field is left \
                     unset until the conflict is resolved."
                ),
            });
            None
        }
    }
}
