//! Versioned mapping rule table.
//!
//! Rules define how classified source units become target tasks, keeping
//! the translation vocabulary out of Rust and inside JSON: adding a rule
//! is a data change, never a code change. The table is loaded once per
//! run and treated as read-only for its duration.

use crate::schema::{Classification, Requirements};
use anyhow::{ensure, Context, Result};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Current schema version for rule tables.
pub const RULES_SCHEMA_VERSION: u32 = 1;

/// Root rule table, keyed by classification category.
///
/// The categories are a closed set; `deny_unknown_fields` rejects tables
/// that invent new ones.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RuleTable {
    pub schema_version: u32,
    #[serde(default)]
    pub context: Vec<MappingRule>,
    #[serde(default)]
    pub lookup: Vec<MappingRule>,
    #[serde(default)]
    pub mutation: Vec<MappingRule>,
    #[serde(default)]
    pub integration: Vec<MappingRule>,
    #[serde(default)]
    pub gate: Vec<MappingRule>,
}

/// One declarative mapping from a source identifier to a target task.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MappingRule {
    pub matcher: Matcher,
    pub action: String,
    pub description: String,
    #[serde(default)]
    pub params: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    pub required_profile_paths: Vec<String>,
    /// Requirement metadata this rule contributes to the source intent,
    /// keyed by requirement field name.
    #[serde(default)]
    pub requires: std::collections::BTreeMap<String, String>,
}

/// Matcher evaluated against a unit's identifier.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Matcher {
    Exact {
        value: String,
        #[serde(default)]
        case_sensitive: bool,
    },
    Prefix {
        value: String,
        #[serde(default)]
        case_sensitive: bool,
    },
    Regex {
        pattern: String,
        #[serde(default)]
        case_sensitive: bool,
        /// Compiled form, filled during validation; the wire format never
        /// carries it.
        #[serde(skip)]
        compiled: OnceLock<Option<regex::Regex>>,
    },
}

impl Matcher {
    /// Evaluate against an identifier. Regex patterns compile once, at
    /// validation; an invalid pattern matches nothing.
    pub fn matches(&self, ident: &str) -> bool {
        match self {
            Matcher::Exact {
                value,
                case_sensitive: true,
            } => ident == value,
            Matcher::Exact {
                value,
                case_sensitive: false,
            } => ident.eq_ignore_ascii_case(value),
            Matcher::Prefix {
                value,
                case_sensitive: true,
            } => ident.starts_with(value.as_str()),
            Matcher::Prefix {
                value,
                case_sensitive: false,
            } => ident
                .get(..value.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(value)),
            Matcher::Regex { .. } => self
                .compiled_regex()
                .is_some_and(|regex| regex.is_match(ident)),
        }
    }

    fn compiled_regex(&self) -> Option<&regex::Regex> {
        let Matcher::Regex {
            pattern,
            case_sensitive,
            compiled,
        } = self
        else {
            return None;
        };
        compiled
            .get_or_init(|| compile_regex(pattern, *case_sensitive, "matcher").ok())
            .as_ref()
    }
}

impl RuleTable {
    /// Rules for one category, in declaration order. Unknown units are
    /// never mapped, so their category has no table.
    pub fn rules_for(&self, category: Classification) -> &[MappingRule] {
        match category {
            Classification::Context => &self.context,
            Classification::Lookup => &self.lookup,
            Classification::Mutation => &self.mutation,
            Classification::Integration => &self.integration,
            Classification::Gate => &self.gate,
            Classification::Unknown => &[],
        }
    }

    fn categories(&self) -> [(&'static str, &[MappingRule]); 5] {
        [
            ("context", self.context.as_slice()),
            ("lookup", self.lookup.as_slice()),
            ("mutation", self.mutation.as_slice()),
            ("integration", self.integration.as_slice()),
            ("gate", self.gate.as_slice()),
        ]
    }
}

/// Load and validate a rule table from a JSON file.
pub fn load_rules(path: &Path) -> Result<RuleTable> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let table: RuleTable = serde_json::from_slice(&bytes).context("parse rule table JSON")?;
    validate_rules(&table)?;
    Ok(table)
}

/// Validate a rule table: version gate, matcher regexes compile, profile
/// placeholders are declared, and requirement fields are known.
pub fn validate_rules(table: &RuleTable) -> Result<()> {
    ensure!(
        table.schema_version == RULES_SCHEMA_VERSION,
        "unsupported rule table schema_version {}",
        table.schema_version
    );

    for (category, rules) in table.categories() {
        for (idx, rule) in rules.iter().enumerate() {
            validate_rule(rule, &format!("{category}[{idx}]"))?;
        }
    }

    Ok(())
}

fn validate_rule(rule: &MappingRule, label: &str) -> Result<()> {
    ensure!(!rule.action.trim().is_empty(), "{label} action must not be empty");
    ensure!(
        !rule.description.trim().is_empty(),
        "{label} description must not be empty"
    );

    if let Matcher::Regex {
        pattern,
        case_sensitive,
        compiled,
    } = &rule.matcher
    {
        let regex = compile_regex(pattern, *case_sensitive, &format!("{label}.matcher"))?;
        let _ = compiled.set(Some(regex));
    }

    for (name, template) in &rule.params {
        for placeholder in template_placeholders(template) {
            if let Some(path) = placeholder.strip_prefix("profile:") {
                ensure!(
                    rule.required_profile_paths.iter().any(|p| p == path),
                    "{label}.params.{name} references profile path \"{path}\" \
                     not listed in required_profile_paths"
                );
            }
        }
    }

    for field in rule.requires.keys() {
        ensure!(
            Requirements::is_known_field(field),
            "{label}.requires names unknown requirement field \"{field}\""
        );
    }

    Ok(())
}

/// Placeholders of the form `{name}` in a parameter template.
pub fn template_placeholders(template: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                found.push(&after[..end]);
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    found
}

fn compile_regex(pattern: &str, case_sensitive: bool, label: &str) -> Result<regex::Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .with_context(|| format!("invalid regex for {label}"))
}
