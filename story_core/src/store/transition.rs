//! The named transitions accepted by the state store.

use serde::{Deserialize, Serialize};
use story_model::{CustomStat, GraphIssue, NodeId, StoryNode};

/// A single state change. Applied atomically, in dispatch order.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    SetLoading(bool),
    SetError(Option<String>),

    /// Record whether the last load attempt failed.
    SetLoadFailed(bool),

    /// Full replace after a successful load.
    SetNodes(Vec<StoryNode>),

    /// Full replace after re-validation.
    SetGraphIssues(Vec<GraphIssue>),

    /// Change focus. Does not touch node data.
    SelectNode(Option<NodeId>),

    /// Replace the node with the matching id. Unknown ids are ignored.
    UpsertNode(StoryNode),

    /// Append and select.
    AddNode(StoryNode),

    /// Remove a node unless it is the last one.
    DeleteNode(NodeId),

    /// Full replace of the stat catalog.
    SetStats(Vec<CustomStat>),

    /// Append unless a stat with the same name exists.
    AddStat(CustomStat),

    RemoveStat(String),

    /// A remote write was issued.
    BeginWrite,

    /// A remote write resolved, successfully or not.
    EndWrite,
}

impl Transition {
    /// Whether applying this transition can change the node collection.
    pub fn touches_nodes(&self) -> bool {
        matches!(
            self,
            Transition::SetNodes(_)
                | Transition::UpsertNode(_)
                | Transition::AddNode(_)
                | Transition::DeleteNode(_)
        )
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Transition::SetLoading(_) => "set_loading",
            Transition::SetError(_) => "set_error",
            Transition::SetLoadFailed(_) => "set_load_failed",
            Transition::SetNodes(_) => "set_nodes",
            Transition::SetGraphIssues(_) => "set_graph_issues",
            Transition::SelectNode(_) => "select_node",
            Transition::UpsertNode(_) => "upsert_node",
            Transition::AddNode(_) => "add_node",
            Transition::DeleteNode(_) => "delete_node",
            Transition::SetStats(_) => "set_stats",
            Transition::AddStat(_) => "add_stat",
            Transition::RemoveStat(_) => "remove_stat",
            Transition::BeginWrite => "begin_write",
            Transition::EndWrite => "end_write",
        }
    }
}

/// Session status shown by the UI.
///
/// `Saving` never implies anything about `nodes`: local state is already in
/// its post-edit shape while writes are in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncStatus {
    /// Nothing loaded yet.
    Idle,
    Loading,
    /// Ready with no writes in flight.
    Ready,
    /// First load failed; state holds the initial seed.
    LoadFailed,
    /// Ready with at least one write in flight.
    Saving,
}
