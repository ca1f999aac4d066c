//! Dependency-respecting linearization of workflow graphs.
//!
//! Kahn's algorithm with a deterministic tie-break: whenever several nodes
//! have no remaining unsatisfied dependencies, the one at the smallest
//! original document position runs first. A dependency cycle is fatal for
//! the document that contains it and leaves other files in the run intact.

use crate::schema::SourceUnit;
use crate::workflow::GraphEdge;
use anyhow::{anyhow, bail, Result};
use std::collections::BTreeSet;

/// Order graph nodes into a single execution sequence.
///
/// The returned units carry renumbered `position` fields reflecting the
/// execution order, so downstream stages treat them exactly like a script's
/// statement sequence. Edges are consumed here and not carried further.
pub fn order_units(units: Vec<SourceUnit>, edges: &[GraphEdge]) -> Result<Vec<SourceUnit>> {
    let count = units.len();
    let mut indegree = vec![0usize; count];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];

    for edge in edges {
        if edge.from >= count || edge.to >= count {
            bail!("graph edge references node index out of range");
        }
        indegree[edge.to] += 1;
        dependents[edge.from].push(edge.to);
    }

    // Ready set ordered by original document position.
    let mut ready: BTreeSet<usize> = indegree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(index, _)| index)
        .collect();

    let mut order = Vec::with_capacity(count);
    while let Some(index) = ready.pop_first() {
        order.push(index);
        for &dependent in &dependents[index] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < count {
        let blocked: Vec<String> = indegree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree > 0)
            .map(|(index, _)| units[index].reference.to_string())
            .collect();
        bail!(
            "workflow contains a dependency cycle involving {}",
            blocked.join(", ")
        );
    }

    let mut by_original: Vec<Option<SourceUnit>> = units.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(count);
    for (execution_position, original_index) in order.into_iter().enumerate() {
        let mut unit = by_original[original_index]
            .take()
            .ok_or_else(|| anyhow!("node ordered twice"))?;
        unit.reference.position = execution_position;
        ordered.push(unit);
    }

    Ok(ordered)
}
