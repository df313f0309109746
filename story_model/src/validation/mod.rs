//! Graph validation - structural diagnostics over a story.
//!
//! The analysis runs in three passes over the node list:
//! 1. **Targets**: collect every non-terminal `next_node_id`
//! 2. **Start**: the first node is the designated start scene
//! 3. **Per node**: emit Dead End, then Orphan, then one Invalid Link per bad choice
//!
//! Orphans are detected by direct inbound edges only. A cluster of scenes that
//! link to each other but are never linked from the start is not reported.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{NodeId, StoryNode};

/// Category of a structural problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueKind {
    /// Scene has no outbound choices.
    #[serde(rename = "Dead End")]
    DeadEnd,
    /// Scene has no inbound choice and is not the start.
    Orphan,
    /// A choice points at a scene that does not exist.
    #[serde(rename = "Invalid Link")]
    InvalidLink,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueKind::DeadEnd => write!(f, "Dead End"),
            IssueKind::Orphan => write!(f, "Orphan"),
            IssueKind::InvalidLink => write!(f, "Invalid Link"),
        }
    }
}

/// A diagnostic attached to a scene. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphIssue {
    /// The offending scene.
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub message: String,
}

impl GraphIssue {
    /// Scene with no outbound choices.
    pub fn dead_end(id: &NodeId) -> Self {
        Self {
            id: id.clone(),
            kind: IssueKind::DeadEnd,
            message: "Node has no outbound choices.".to_string(),
        }
    }

    /// Scene that no choice points at.
    pub fn orphan(id: &NodeId) -> Self {
        Self {
            id: id.clone(),
            kind: IssueKind::Orphan,
            message: "Node is unreachable from the starting point.".to_string(),
        }
    }

    /// Choice on `id` pointing at the missing `target`.
    pub fn invalid_link(id: &NodeId, target: &NodeId) -> Self {
        Self {
            id: id.clone(),
            kind: IssueKind::InvalidLink,
            message: format!("Links to missing node: '{}'.", target),
        }
    }
}

/// Analyze a story graph. Pure and deterministic, O(nodes + choices).
///
/// Output follows input node order; within a node the order is Dead End,
/// Orphan, then Invalid Links in choice order.
pub fn analyze(nodes: &[StoryNode]) -> Vec<GraphIssue> {
    let Some(start) = nodes.first().map(|n| &n.id) else {
        return Vec::new();
    };

    let targets: HashSet<&NodeId> = nodes.iter().flat_map(|n| n.targets()).collect();
    let known: HashSet<&NodeId> = nodes.iter().map(|n| &n.id).collect();

    let mut issues = Vec::new();
    for node in nodes {
        if node.is_dead_end() {
            issues.push(GraphIssue::dead_end(&node.id));
        }

        if &node.id != start && !targets.contains(&node.id) {
            issues.push(GraphIssue::orphan(&node.id));
        }

        for target in node.targets() {
            if !known.contains(target) {
                issues.push(GraphIssue::invalid_link(&node.id, target));
            }
        }
    }

    issues
}
