//! Snapshot of a declared stack

use std::collections::BTreeSet;
use std::fmt::Write;

use serde::Serialize;

use crate::urn::Urn;

/// One declaration in the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// URN of the declaration
    pub urn: Urn,
    /// Type token
    pub type_token: String,
    /// Parent declaration
    pub parent: Option<Urn>,
    /// Explicit dependencies plus the sources of every input
    pub dependencies: BTreeSet<Urn>,
}

/// Declared resources in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclaredGraph {
    /// Stack name
    pub stack: String,
    /// Nodes in declaration order
    pub nodes: Vec<GraphNode>,
}

impl DeclaredGraph {
    /// Look up a node by URN
    pub fn node(&self, urn: &Urn) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| &n.urn == urn)
    }

    /// Nodes without a parent
    pub fn roots(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| n.parent.is_none())
    }

    /// Direct children of `urn`
    pub fn children<'a>(&'a self, urn: &'a Urn) -> impl Iterator<Item = &'a GraphNode> + 'a {
        self.nodes
            .iter()
            .filter(move |n| n.parent.as_ref() == Some(urn))
    }

    /// Nodes whose type token matches
    pub fn of_type<'a>(&'a self, token: &'a str) -> impl Iterator<Item = &'a GraphNode> + 'a {
        self.nodes.iter().filter(move |n| n.type_token == token)
    }

    /// Chain of ancestors of `urn`, nearest first
    pub fn ancestors(&self, urn: &Urn) -> Vec<&GraphNode> {
        let mut chain = Vec::new();
        let mut current = self.node(urn).and_then(|n| n.parent.as_ref());
        while let Some(parent) = current {
            let Some(node) = self.node(parent) else { break };
            if chain.iter().any(|n: &&GraphNode| n.urn == node.urn) {
                break;
            }
            chain.push(node);
            current = node.parent.as_ref();
        }
        chain
    }

    /// Indented parent tree, one resource per line
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        for root in self.roots() {
            self.render_node(root, 0, &mut out);
        }
        out
    }

    fn render_node(&self, node: &GraphNode, depth: usize, out: &mut String) {
        let _ = write!(
            out,
            "{}{} ({})",
            "  ".repeat(depth),
            node.urn.name(),
            node.type_token
        );
        let extra: Vec<&str> = node
            .dependencies
            .iter()
            .filter(|d| Some(*d) != node.parent.as_ref())
            .map(|d| d.name())
            .collect();
        if !extra.is_empty() {
            let _ = write!(out, " <- {}", extra.join(", "));
        }
        out.push('\n');
        for child in self.children(&node.urn) {
            self.render_node(child, depth + 1, out);
        }
    }
}
