//! End-to-end pipeline tests over the library, driven by the fixtures in
//! `tests/data/`.

use intent_bridge::merge::{merge_intents, InputPrecedence};
use intent_bridge::rules::{validate_rules, RuleTable};
use intent_bridge::schema::TaskStatus;
use intent_bridge::templates;
use intent_bridge::translate::{translate_script_source, translate_workflow_source};
use std::fs;

fn starter_rules() -> RuleTable {
    let table: RuleTable =
        serde_json::from_str(templates::STARTER_RULES_JSON).expect("parse starter rules");
    validate_rules(&table).expect("starter rules valid");
    table
}

fn profile() -> serde_json::Value {
    let content = fs::read_to_string("tests/data/profile.json").expect("profile fixture");
    serde_json::from_str(&content).expect("parse profile fixture")
}

#[test]
fn golden_provision_intent_snapshot() {
    let content = fs::read_to_string("tests/data/provision.ps1").expect("script fixture");
    let intent = translate_script_source(
        "tests/data/provision.ps1",
        &content,
        &starter_rules(),
        &profile(),
    );

    let actual = serde_json::to_string_pretty(&intent).expect("serialize intent");
    let expected =
        fs::read_to_string("tests/golden/provision_intent.json").expect("golden missing");
    assert_eq!(expected.trim_end(), actual);
}

#[test]
fn workflow_fixture_orders_and_resolves() {
    let content = fs::read_to_string("tests/data/flow.xml").expect("workflow fixture");
    let intent = translate_workflow_source(
        "tests/data/flow.xml",
        &content,
        &starter_rules(),
        &profile(),
    )
    .expect("translate workflow");

    let actions: Vec<&str> = intent.tasks.iter().map(|t| t.action.as_str()).collect();
    assert_eq!(actions, ["cloud.vm", "flow.approval", "cloud.vm_network"]);
    assert!(intent
        .tasks
        .iter()
        .all(|task| task.status == TaskStatus::Resolved));

    // Workflow variable references render in target templating syntax.
    assert_eq!(
        intent.tasks[0].params.get("name").map(String::as_str),
        Some("{{ vm_name }}")
    );
    assert_eq!(
        intent.tasks[0].params.get("memory").map(String::as_str),
        Some("16Gi")
    );

    assert_eq!(intent.inputs.len(), 2);
    assert_eq!(intent.outputs, vec!["vm_id".to_string()]);
    assert_eq!(intent.requirements.cpu_count, Some(4));
    assert_eq!(intent.requirements.memory_gb, Some(16));
    assert_eq!(intent.requirements.approval_required, Some(true));
    assert!(intent.gaps.is_empty());
}

#[test]
fn script_and_workflow_merge_without_conflicts() {
    let rules = starter_rules();
    let profile = profile();

    let script = fs::read_to_string("tests/data/provision.ps1").expect("script fixture");
    let flow = fs::read_to_string("tests/data/flow.xml").expect("workflow fixture");

    let a = translate_script_source("tests/data/provision.ps1", &script, &rules, &profile);
    let b = translate_workflow_source("tests/data/flow.xml", &flow, &rules, &profile)
        .expect("translate workflow");

    let merged = merge_intents(&[a, b], InputPrecedence::default());
    assert!(!merged.has_conflicts());

    // Largest declared need wins for sizing; both sources agree on network.
    assert_eq!(merged.requirements.memory_gb, Some(16));
    assert_eq!(merged.requirements.cpu_count, Some(4));
    assert_eq!(merged.requirements.approval_required, Some(true));
    assert_eq!(merged.requirements.target_network.as_deref(), Some("prod"));
    assert_eq!(merged.outputs, vec!["vm_id".to_string()]);

    // The script's one unparseable line survives into the merged gap list.
    assert_eq!(merged.gaps.len(), 1);
    assert_eq!(merged.gaps[0].source_path, "tests/data/provision.ps1");

    // Sources stay grouped and sorted by path.
    let paths: Vec<&str> = merged
        .sources
        .iter()
        .map(|s| s.source_path.as_str())
        .collect();
    assert_eq!(paths, ["tests/data/flow.xml", "tests/data/provision.ps1"]);
}
