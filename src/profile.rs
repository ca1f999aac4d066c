//! Environment-profile resolution and blocked-stub generation.
//!
//! The profile is an opaque nested key-value document queried by dotted
//! path. A missing path is never an error: the task degrades to a tagged
//! `Blocked` status with deterministic remediation text, and the caller
//! must handle both outcomes explicitly.

use crate::mapping::PendingTask;
use crate::schema::{ResolvedTask, TaskStatus};
use serde_json::Value;

/// Resolve a pending task's profile placeholders.
///
/// A task is blocked if and only if at least one of its rule's required
/// profile paths is absent from the profile.
pub fn resolve_task(pending: PendingTask, profile: &Value) -> ResolvedTask {
    let mut missing = Vec::new();
    let mut params = pending.params;

    for path in &pending.required_profile_paths {
        match lookup_path(profile, path) {
            Some(value) => {
                let needle = format!("{{profile:{path}}}");
                let replacement = scalar_text(value);
                for param in params.values_mut() {
                    if param.contains(&needle) {
                        *param = param.replace(&needle, &replacement);
                    }
                }
            }
            None => missing.push(path.clone()),
        }
    }

    if missing.is_empty() {
        ResolvedTask {
            unit: pending.unit,
            description: pending.description,
            action: pending.action,
            params,
            status: TaskStatus::Resolved,
            blocked_reason: None,
        }
    } else {
        let reason = blocked_reason(&pending.description, &missing, &pending.raw_excerpt);
        ResolvedTask {
            unit: pending.unit,
            description: pending.description,
            action: pending.action,
            params,
            status: TaskStatus::Blocked,
            blocked_reason: Some(reason),
        }
    }
}

/// Remediation text naming the task, the missing keys, the original
/// evidence, and the exact keys an operator must add to unblock it.
fn blocked_reason(description: &str, missing: &[String], evidence: &str) -> String {
    format!(
        "Task \"{description}\" is blocked: profile configuration missing {keys}. \
         Evidence: `{evidence}`. Add {adds} to the environment profile and re-run.",
        keys = missing.join(", "),
        adds = missing
            .iter()
            .map(|path| format!("\"{path}\""))
            .collect::<Vec<_>>()
            .join(" and "),
    )
}

/// Dotted-path lookup into a nested JSON document.
pub fn lookup_path<'a>(profile: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = profile;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
