//! Stable artifact serialization.
//!
//! Intents and reports are operator-diffed across runs, so output is
//! pretty-printed JSON with fixed field order and map keys sorted by the
//! underlying `BTreeMap`s. Files end with a newline so plain-text tooling
//! behaves.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Render a value in the canonical on-disk form.
pub fn to_stable_json<T: Serialize>(value: &T) -> Result<String> {
    let mut text = serde_json::to_string_pretty(value).context("serialize artifact JSON")?;
    text.push('\n');
    Ok(text)
}

/// Write a value as canonical JSON, creating parent directories as needed.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = to_stable_json(value)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
