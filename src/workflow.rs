//! Parser for XML workflow-graph exports.
//!
//! A workflow document declares tasks, decision points, input/output
//! declarations, and `<link>` edges between nodes. Only unparseable XML or
//! a structurally broken graph (missing/duplicate node id, edge to an
//! undeclared node) fails the document; an element the parser does not
//! recognize becomes an unknown node, matching the script parser's
//! resilience contract.

use crate::schema::{DeclaredInput, ParamValue, SourceUnit, UnitKind, UnitRef};
use anyhow::{bail, Context, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Identifier assigned to decision/approval nodes.
pub const DECISION_IDENT: &str = "decision";

/// A directed dependency between two graph nodes. Consumed by the
/// dependency orderer and discarded afterwards; never part of an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    /// Index into `WorkflowDoc::units` of the prerequisite node.
    pub from: usize,
    /// Index into `WorkflowDoc::units` of the dependent node.
    pub to: usize,
}

/// Parsed workflow document before ordering.
#[derive(Debug, Clone)]
pub struct WorkflowDoc {
    pub name: Option<String>,
    /// Task and decision nodes in document order; `UnitRef::position` is
    /// the document position the orderer uses for tie-breaking.
    pub units: Vec<SourceUnit>,
    pub edges: Vec<GraphEdge>,
    pub inputs: Vec<DeclaredInput>,
    pub outputs: Vec<String>,
}

/// Parse an XML workflow export into nodes, edges, and declarations.
pub fn parse_workflow(content: &str) -> Result<WorkflowDoc> {
    let doc = roxmltree::Document::parse(content).context("parse workflow XML")?;
    let root = doc.root_element();
    if root.tag_name().name() != "workflow" {
        bail!(
            "workflow root element is <{}>, expected <workflow>",
            root.tag_name().name()
        );
    }

    let name = root.attribute("name").map(|value| value.to_string());
    let mut units = Vec::new();
    let mut ids: BTreeMap<String, usize> = BTreeMap::new();
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    let mut links: Vec<(String, String)> = Vec::new();

    for element in root.children().filter(|node| node.is_element()) {
        match element.tag_name().name() {
            // A declaration missing its attributes degrades to an unknown
            // node like any unrecognized element; only a structurally
            // broken graph fails the document.
            "input" => match element.attribute("name") {
                Some(name) => inputs.push(parse_input(element, name)),
                None => {
                    let unit = unknown_node(element, units.len());
                    register_id(&mut ids, &unit, units.len())?;
                    units.push(unit);
                }
            },
            "output" => match element.attribute("name") {
                Some(name) => outputs.push(name.to_string()),
                None => {
                    let unit = unknown_node(element, units.len());
                    register_id(&mut ids, &unit, units.len())?;
                    units.push(unit);
                }
            },
            "link" => match (element.attribute("from"), element.attribute("to")) {
                (Some(from), Some(to)) => links.push((from.to_string(), to.to_string())),
                _ => {
                    let unit = unknown_node(element, units.len());
                    register_id(&mut ids, &unit, units.len())?;
                    units.push(unit);
                }
            },
            "task" => {
                let unit = parse_task(element, units.len());
                register_id(&mut ids, &unit, units.len())?;
                units.push(unit);
            }
            "decision" => {
                let unit = parse_decision(element, units.len());
                register_id(&mut ids, &unit, units.len())?;
                units.push(unit);
            }
            _ => {
                // Unrecognized elements still occupy a node slot so their
                // presence is reported as a gap, not silently dropped.
                let unit = unknown_node(element, units.len());
                register_id(&mut ids, &unit, units.len())?;
                units.push(unit);
            }
        }
    }

    let mut edges = Vec::new();
    let mut seen: BTreeSet<(usize, usize)> = BTreeSet::new();
    for (from, to) in links {
        let from_idx = *ids
            .get(&from)
            .with_context(|| format!("<link from=\"{from}\"> references an undeclared node"))?;
        let to_idx = *ids
            .get(&to)
            .with_context(|| format!("<link to=\"{to}\"> references an undeclared node"))?;
        if seen.insert((from_idx, to_idx)) {
            edges.push(GraphEdge {
                from: from_idx,
                to: to_idx,
            });
        }
    }

    Ok(WorkflowDoc {
        name,
        units,
        edges,
        inputs,
        outputs,
    })
}

fn parse_input(element: roxmltree::Node<'_, '_>, name: &str) -> DeclaredInput {
    DeclaredInput {
        name: name.to_string(),
        input_type: element.attribute("type").unwrap_or("string").to_string(),
        default: element.attribute("default").map(|value| value.to_string()),
    }
}

fn parse_task(element: roxmltree::Node<'_, '_>, position: usize) -> SourceUnit {
    let ident = element.attribute("call").map(|value| value.to_string());
    let mut params = BTreeMap::new();
    for child in element.children().filter(|node| node.is_element()) {
        if child.tag_name().name() != "param" {
            continue;
        }
        let (Some(name), Some(value)) = (child.attribute("name"), child.attribute("value")) else {
            continue;
        };
        params.insert(name.to_string(), param_value(value));
    }

    // A task without a call target keeps its node slot so the gap report
    // can name it.
    SourceUnit {
        reference: node_ref(element, position),
        kind: UnitKind::GraphNode,
        raw: raw_excerpt(element),
        ident,
        params,
    }
}

fn parse_decision(element: roxmltree::Node<'_, '_>, position: usize) -> SourceUnit {
    let mut params = BTreeMap::new();
    if let Some(label) = element.attribute("label") {
        params.insert("label".to_string(), ParamValue::Literal(label.to_string()));
    }
    SourceUnit {
        reference: node_ref(element, position),
        kind: UnitKind::GraphNode,
        raw: raw_excerpt(element),
        ident: Some(DECISION_IDENT.to_string()),
        params,
    }
}

fn unknown_node(element: roxmltree::Node<'_, '_>, position: usize) -> SourceUnit {
    SourceUnit {
        reference: node_ref(element, position),
        kind: UnitKind::GraphNode,
        raw: raw_excerpt(element),
        ident: None,
        params: BTreeMap::new(),
    }
}

fn node_ref(element: roxmltree::Node<'_, '_>, position: usize) -> UnitRef {
    UnitRef {
        position,
        line: None,
        node_id: element.attribute("id").map(|value| value.to_string()),
    }
}

/// Workflow parameter values use the same sigil convention as scripts: a
/// leading `$` marks a reference to a workflow variable or input.
fn param_value(value: &str) -> ParamValue {
    match value.strip_prefix('$') {
        Some(name) if !name.is_empty() => ParamValue::VarRef(name.to_string()),
        _ => ParamValue::Literal(value.to_string()),
    }
}

fn register_id(ids: &mut BTreeMap<String, usize>, unit: &SourceUnit, index: usize) -> Result<()> {
    let Some(id) = unit.reference.node_id.as_ref() else {
        return Ok(());
    };
    if ids.insert(id.clone(), index).is_some() {
        bail!("duplicate node id \"{id}\" in workflow");
    }
    Ok(())
}

fn raw_excerpt(element: roxmltree::Node<'_, '_>) -> String {
    let tag = element.tag_name().name();
    let attrs: Vec<String> = element
        .attributes()
        .map(|attr| format!("{}=\"{}\"", attr.name(), attr.value()))
        .collect();
    if attrs.is_empty() {
        format!("<{tag}>")
    } else {
        format!("<{tag} {}>", attrs.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKFLOW: &str = r#"<workflow name="provision-db">
  <input name="cpu_count" type="number" default="2"/>
  <input name="vm_name"/>
  <task id="create" call="CreateVM">
    <param name="name" value="$vm_name"/>
    <param name="memoryGB" value="8"/>
  </task>
  <decision id="approve" label="Manager approval"/>
  <task id="attach" call="AttachNetworkAdapter">
    <param name="vm" value="$vm_name"/>
    <param name="network" value="prod"/>
  </task>
  <link from="create" to="approve"/>
  <link from="approve" to="attach"/>
  <output name="vm_id"/>
</workflow>"#;

    #[test]
    fn parses_nodes_edges_and_declarations() {
        let doc = parse_workflow(WORKFLOW).expect("parse workflow");
        assert_eq!(doc.name.as_deref(), Some("provision-db"));
        assert_eq!(doc.units.len(), 3);
        assert_eq!(doc.edges.len(), 2);
        assert_eq!(doc.outputs, vec!["vm_id".to_string()]);

        assert_eq!(doc.inputs[0].name, "cpu_count");
        assert_eq!(doc.inputs[0].input_type, "number");
        assert_eq!(doc.inputs[0].default.as_deref(), Some("2"));
        assert_eq!(doc.inputs[1].input_type, "string");

        let create = &doc.units[0];
        assert_eq!(create.ident.as_deref(), Some("CreateVM"));
        assert_eq!(create.reference.node_id.as_deref(), Some("create"));
        assert_eq!(
            create.params.get("name"),
            Some(&ParamValue::VarRef("vm_name".into()))
        );
        assert_eq!(
            create.params.get("memoryGB"),
            Some(&ParamValue::Literal("8".into()))
        );

        let approve = &doc.units[1];
        assert_eq!(approve.ident.as_deref(), Some(DECISION_IDENT));
        assert_eq!(
            approve.params.get("label"),
            Some(&ParamValue::Literal("Manager approval".into()))
        );

        assert_eq!(doc.edges[0], GraphEdge { from: 0, to: 1 });
        assert_eq!(doc.edges[1], GraphEdge { from: 1, to: 2 });
    }

    #[test]
    fn unrecognized_element_becomes_unknown_node() {
        let xml = r#"<workflow><scriptable id="s1"><body>js</body></scriptable></workflow>"#;
        let doc = parse_workflow(xml).expect("parse workflow");
        assert_eq!(doc.units.len(), 1);
        assert!(doc.units[0].ident.is_none());
        assert!(doc.units[0].raw.contains("scriptable"));
    }

    #[test]
    fn declaration_missing_attributes_degrades_to_unknown_nodes() {
        let xml = r#"<workflow><output/><link from="a"/><task id="t" call="X"/></workflow>"#;
        let doc = parse_workflow(xml).expect("parse workflow");
        assert_eq!(doc.units.len(), 3);
        assert!(doc.units[0].ident.is_none());
        assert!(doc.units[1].ident.is_none());
        assert_eq!(doc.units[2].ident.as_deref(), Some("X"));
        assert!(doc.edges.is_empty());
        assert!(doc.outputs.is_empty());
        assert!(doc.inputs.is_empty());
    }

    #[test]
    fn invalid_xml_fails_the_document() {
        assert!(parse_workflow("<workflow><task></workflow>").is_err());
    }

    #[test]
    fn link_to_undeclared_node_fails_the_document() {
        let xml = r#"<workflow><task id="a" call="X"/><link from="a" to="ghost"/></workflow>"#;
        let err = parse_workflow(xml).expect_err("undeclared link target");
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn duplicate_node_id_fails_the_document() {
        let xml = r#"<workflow><task id="a" call="X"/><task id="a" call="Y"/></workflow>"#;
        assert!(parse_workflow(xml).is_err());
    }
}
