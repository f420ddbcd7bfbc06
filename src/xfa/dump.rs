//! Serializable snapshot of a Form subtree.

use super::document::XfaDocument;
use super::node::{Element, NodeId};
use serde::Serialize;

/// One Form node with its binding and container children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormNodeDump {
    /// XFA element name
    pub element: &'static str,
    /// Node name
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Dotted path of the bound Data node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Current field value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Container and instance-manager children
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FormNodeDump>,
}

impl FormNodeDump {
    /// Snapshot `node` and its container descendants.
    pub fn build(doc: &XfaDocument, node: NodeId) -> Self {
        let tree = doc.tree();
        let element = tree.element(node);
        let data = doc.binding(node);
        let value = match element {
            Element::Field | Element::Draw => data.and_then(|d| doc.value(d)).or_else(|| doc.value(node)),
            _ => None,
        };
        let children = tree
            .children(node)
            .iter()
            .copied()
            .filter(|&c| tree.is_container(c) || tree.element(c) == Element::InstanceManager)
            .map(|c| Self::build(doc, c))
            .collect();
        Self {
            element: element.xfa_name(),
            name: tree.name(node).to_string(),
            data: data.map(|d| tree.path(d)),
            value,
            children,
        }
    }

    /// Children with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FormNodeDump> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Pretty JSON rendering.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
