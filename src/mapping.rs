//! Rule-table matching and parameter template substitution.
//!
//! For a classified unit the engine scans its category's rule list in
//! declaration order; the first matcher hit wins. Three substitution forms
//! are supported: direct (`{name}`), literal prefix/suffix preserved around
//! the placeholder (`{memoryGB}Gi`), and variable references re-emitted in
//! target templating syntax. `no_match` is a translation gap, not an error.

use crate::rules::{template_placeholders, MappingRule, RuleTable};
use crate::schema::{
    Classification, GapReason, GapRecord, ParamValue, Requirements, SourceUnit, UnitRef,
};
use std::collections::BTreeMap;

/// A matched task whose profile placeholders are still unresolved.
#[derive(Debug, Clone)]
pub struct PendingTask {
    pub unit: UnitRef,
    pub raw_excerpt: String,
    pub description: String,
    pub action: String,
    pub params: BTreeMap<String, String>,
    pub required_profile_paths: Vec<String>,
}

/// Outcome of mapping one classified unit.
#[derive(Debug, Clone)]
pub enum MapOutcome {
    Task(PendingTask),
    Gap(GapRecord),
}

/// Map a classified unit against the rule table.
///
/// Requirement metadata declared by the matched rule is recorded into
/// `requirements`; a `requires` template that cannot be filled from the
/// unit's literal parameters contributes nothing rather than failing the
/// task.
pub fn map_unit(
    unit: &SourceUnit,
    category: Classification,
    table: &RuleTable,
    requirements: &mut Requirements,
) -> MapOutcome {
    let Some(ident) = unit.ident.as_deref() else {
        return MapOutcome::Gap(no_match_gap(unit, category));
    };

    let Some(rule) = table
        .rules_for(category)
        .iter()
        .find(|rule| rule.matcher.matches(ident))
    else {
        return MapOutcome::Gap(no_match_gap(unit, category));
    };

    let mut params = BTreeMap::new();
    for (name, template) in &rule.params {
        match substitute(template, &unit.params) {
            Ok(value) => {
                params.insert(name.clone(), value);
            }
            Err(missing) => {
                return MapOutcome::Gap(GapRecord {
                    unit: unit.reference.clone(),
                    reason: GapReason::MissingParameter {
                        parameter: missing.clone(),
                    },
                    raw_excerpt: unit.raw.clone(),
                    remediation: format!(
                        "Rule \"{}\" maps this unit but needs parameter \"{missing}\", \
                         which the source does not provide. Supply it in the source or \
                         relax the rule template.",
                        rule.action
                    ),
                });
            }
        }
    }

    record_requirements(rule, unit, requirements);

    MapOutcome::Task(PendingTask {
        unit: unit.reference.clone(),
        raw_excerpt: unit.raw.clone(),
        description: rule.description.clone(),
        action: rule.action.clone(),
        params,
        required_profile_paths: rule.required_profile_paths.clone(),
    })
}

fn no_match_gap(unit: &SourceUnit, category: Classification) -> GapRecord {
    GapRecord {
        unit: unit.reference.clone(),
        reason: GapReason::NoMappingRule { category },
        raw_excerpt: unit.raw.clone(),
        remediation: format!(
            "No {} rule matches this unit. Add a rule for it to the mapping \
             table, or translate it by hand.",
            category.table_key()
        ),
    }
}

/// Fill `{name}` placeholders from unit parameters.
///
/// Profile placeholders (`{profile:...}`) pass through untouched for the
/// profile resolver. Variable references render as `{{ name }}` since their
/// value is only known at target-execution time.
fn substitute(
    template: &str,
    params: &BTreeMap<String, ParamValue>,
) -> Result<String, String> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        output.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            output.push_str(&rest[start..]);
            return Ok(output);
        };
        let placeholder = &after[..end];
        if placeholder.starts_with("profile:") {
            output.push('{');
            output.push_str(placeholder);
            output.push('}');
        } else {
            match params.get(placeholder) {
                Some(ParamValue::Literal(value)) => output.push_str(value),
                Some(ParamValue::VarRef(name)) => {
                    output.push_str("{{ ");
                    output.push_str(name);
                    output.push_str(" }}");
                }
                None => return Err(placeholder.to_string()),
            }
        }
        rest = &after[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

/// Apply a rule's `requires` declarations. Only literal parameter values
/// can feed requirement metadata; unresolved templates are skipped.
fn record_requirements(rule: &MappingRule, unit: &SourceUnit, requirements: &mut Requirements) {
    for (field, template) in &rule.requires {
        let Some(value) = substitute_literal(template, &unit.params) else {
            continue;
        };
        if let Err(error) = requirements.declare(field, &value) {
            tracing::debug!(field, %error, "skipping unparseable requirement value");
        }
    }
}

fn substitute_literal(template: &str, params: &BTreeMap<String, ParamValue>) -> Option<String> {
    let mut value = template.to_string();
    for placeholder in template_placeholders(template) {
        let literal = params.get(placeholder)?.as_literal()?;
        value = value.replace(&format!("{{{placeholder}}}"), literal);
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::schema::{UnitKind, UnitRef};
    use crate::templates;

    fn starter_table() -> RuleTable {
        serde_json::from_str(templates::STARTER_RULES_JSON).expect("starter table")
    }

    fn unit(ident: &str, params: &[(&str, ParamValue)]) -> SourceUnit {
        SourceUnit {
            reference: UnitRef {
                position: 0,
                line: Some(1),
                node_id: None,
            },
            kind: UnitKind::Statement,
            raw: format!("{ident} ..."),
            ident: Some(ident.to_string()),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn maps_create_vm_with_suffix_preserving_substitution() {
        let table = starter_table();
        let mut requirements = Requirements::default();
        let unit = unit(
            "CreateVM",
            &[
                ("name", ParamValue::Literal("db01".into())),
                ("memoryGB", ParamValue::Literal("8".into())),
            ],
        );
        let outcome = map_unit(&unit, classify(&unit), &table, &mut requirements);
        let MapOutcome::Task(task) = outcome else {
            panic!("expected task");
        };
        assert_eq!(task.action, "cloud.vm");
        assert_eq!(task.params.get("memory").map(String::as_str), Some("8Gi"));
        assert_eq!(task.params.get("name").map(String::as_str), Some("db01"));
        assert_eq!(requirements.memory_gb, Some(8));
        // cpuCount is absent from the unit, so the requires entry is skipped.
        assert_eq!(requirements.cpu_count, None);
    }

    #[test]
    fn variable_reference_renders_target_templating_syntax() {
        let table = starter_table();
        let mut requirements = Requirements::default();
        let unit = unit(
            "AttachNetworkAdapter",
            &[
                ("vm", ParamValue::VarRef("vmName".into())),
                ("network", ParamValue::Literal("prod".into())),
            ],
        );
        let outcome = map_unit(&unit, classify(&unit), &table, &mut requirements);
        let MapOutcome::Task(task) = outcome else {
            panic!("expected task");
        };
        assert_eq!(
            task.params.get("vm").map(String::as_str),
            Some("{{ vmName }}")
        );
        // Profile placeholder passes through for the resolver.
        assert_eq!(
            task.params.get("security_model").map(String::as_str),
            Some("{profile:network_security.model}")
        );
        assert_eq!(requirements.target_network.as_deref(), Some("prod"));
    }

    #[test]
    fn unmatched_identifier_is_a_no_match_gap() {
        let table = starter_table();
        let mut requirements = Requirements::default();
        let unit = unit("ResizeCluster", &[]);
        let outcome = map_unit(&unit, classify(&unit), &table, &mut requirements);
        let MapOutcome::Gap(gap) = outcome else {
            panic!("expected gap");
        };
        assert!(matches!(
            gap.reason,
            GapReason::NoMappingRule {
                category: Classification::Mutation
            }
        ));
        assert_eq!(gap.raw_excerpt, "ResizeCluster ...");
    }

    #[test]
    fn missing_template_parameter_is_a_gap_not_a_task() {
        let table = starter_table();
        let mut requirements = Requirements::default();
        let unit = unit("CreateVM", &[("name", ParamValue::Literal("db01".into()))]);
        let outcome = map_unit(&unit, classify(&unit), &table, &mut requirements);
        let MapOutcome::Gap(gap) = outcome else {
            panic!("expected gap");
        };
        assert!(matches!(
            gap.reason,
            GapReason::MissingParameter { ref parameter } if parameter == "memoryGB"
        ));
        assert!(gap.remediation.contains("memoryGB"));
    }

    #[test]
    fn decision_gate_declares_approval_requirement() {
        let table = starter_table();
        let mut requirements = Requirements::default();
        let unit = unit("decision", &[]);
        let outcome = map_unit(&unit, classify(&unit), &table, &mut requirements);
        assert!(matches!(outcome, MapOutcome::Task(_)));
        assert_eq!(requirements.approval_required, Some(true));
    }

    #[test]
    fn requires_skips_variable_reference_values() {
        let table = starter_table();
        let mut requirements = Requirements::default();
        let unit = unit(
            "AttachNetworkAdapter",
            &[
                ("vm", ParamValue::Literal("db01".into())),
                ("network", ParamValue::VarRef("netName".into())),
            ],
        );
        let outcome = map_unit(&unit, classify(&unit), &table, &mut requirements);
        assert!(matches!(outcome, MapOutcome::Task(_)));
        assert_eq!(requirements.target_network, None);
    }
}
