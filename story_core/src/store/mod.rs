//! State Store - the single authoritative in-memory state of an open story.
//!
//! Every mutation goes through [`Transition`]. Transitions that touch the node
//! collection re-run the graph validator from scratch, so `graph_issues`
//! always matches `nodes`.

mod transition;

pub use transition::*;

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use story_model::{analyze, CustomStat, GraphIssue, NodeId, StoryNode};
use tokio::sync::watch;
use tracing::{debug, trace};

/// Snapshot of everything the UI reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryState {
    pub nodes: Vec<StoryNode>,
    pub selected_node_id: Option<NodeId>,
    pub is_loading: bool,
    /// Single-slot failure message, cleared by the next successful operation.
    pub error: Option<String>,
    /// Derived from `nodes`. Never persisted.
    pub graph_issues: Vec<GraphIssue>,
    pub custom_stats: Vec<CustomStat>,

    /// Remote writes issued but not yet resolved.
    pub pending_writes: usize,

    /// Set once a load has installed nodes.
    pub has_loaded: bool,

    /// The last load attempt failed. Cleared by the next successful load.
    pub load_failed: bool,
}

impl StoryState {
    /// State before any load: one seeded start node, selected.
    pub fn seeded(start: StoryNode) -> Self {
        let selected = Some(start.id.clone());
        let nodes = vec![start];
        Self {
            graph_issues: analyze(&nodes),
            nodes,
            selected_node_id: selected,
            is_loading: false,
            error: None,
            custom_stats: Vec::new(),
            pending_writes: 0,
            has_loaded: false,
            load_failed: false,
        }
    }

    /// Get a node by id.
    pub fn node(&self, id: &NodeId) -> Option<&StoryNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// The node currently in focus.
    pub fn selected_node(&self) -> Option<&StoryNode> {
        self.selected_node_id.as_ref().and_then(|id| self.node(id))
    }

    /// The designated start scene.
    pub fn start_node(&self) -> Option<&StoryNode> {
        self.nodes.first()
    }

    /// Node ids in collection order.
    pub fn all_node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    /// Stat names in catalog order.
    pub fn all_stat_names(&self) -> Vec<String> {
        self.custom_stats.iter().map(|s| s.name.clone()).collect()
    }

    /// Issues reported against a single node.
    pub fn issues_for(&self, id: &NodeId) -> Vec<&GraphIssue> {
        self.graph_issues.iter().filter(|i| &i.id == id).collect()
    }

    /// Export is only allowed on a clean graph.
    pub fn can_export(&self) -> bool {
        self.graph_issues.is_empty()
    }

    /// Session status derived from the loading and write flags.
    ///
    /// `LoadFailed` needs a failed load before any successful one; other
    /// errors recorded on the seeded state leave it `Idle`.
    pub fn status(&self) -> SyncStatus {
        if self.is_loading {
            SyncStatus::Loading
        } else if !self.has_loaded {
            if self.load_failed {
                SyncStatus::LoadFailed
            } else {
                SyncStatus::Idle
            }
        } else if self.pending_writes > 0 {
            SyncStatus::Saving
        } else {
            SyncStatus::Ready
        }
    }
}

/// Single-writer state machine over [`StoryState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    state: StoryState,
}

impl StateStore {
    /// Create a store seeded with one start node.
    pub fn new(start: StoryNode) -> Self {
        Self {
            state: StoryState::seeded(start),
        }
    }

    /// The current state.
    pub fn state(&self) -> &StoryState {
        &self.state
    }

    /// Apply a transition. Node-changing transitions trigger re-validation.
    pub fn apply(&mut self, transition: Transition) {
        trace!(transition = transition.name(), "Applying transition");
        let revalidate = transition.touches_nodes();
        let state = &mut self.state;

        match transition {
            Transition::SetLoading(loading) => state.is_loading = loading,
            Transition::SetError(error) => state.error = error,
            Transition::SetNodes(nodes) => {
                state.nodes = nodes;
                state.has_loaded = true;
                state.load_failed = false;
            }
            Transition::SetLoadFailed(failed) => state.load_failed = failed,
            Transition::SetGraphIssues(issues) => state.graph_issues = issues,
            Transition::SelectNode(id) => state.selected_node_id = id,
            Transition::UpsertNode(node) => {
                match state.nodes.iter_mut().find(|n| n.id == node.id) {
                    Some(existing) => *existing = node,
                    None => debug!(node_id = %node.id, "Upsert for unknown node ignored"),
                }
            }
            Transition::AddNode(node) => {
                let id = node.id.clone();
                match state.nodes.iter_mut().find(|n| n.id == id) {
                    Some(existing) => *existing = node,
                    None => state.nodes.push(node),
                }
                state.selected_node_id = Some(id);
            }
            Transition::DeleteNode(id) => {
                if state.nodes.len() <= 1 {
                    debug!(node_id = %id, "Refusing to delete the last node");
                } else {
                    state.nodes.retain(|n| n.id != id);
                    if state.selected_node_id.as_ref() == Some(&id) {
                        state.selected_node_id = state.nodes.first().map(|n| n.id.clone());
                    }
                }
            }
            Transition::SetStats(stats) => state.custom_stats = stats,
            Transition::AddStat(stat) => {
                if state.custom_stats.iter().any(|s| s.name == stat.name) {
                    debug!(stat = %stat.name, "Duplicate stat ignored");
                } else {
                    state.custom_stats.push(stat);
                }
            }
            Transition::RemoveStat(name) => state.custom_stats.retain(|s| s.name != name),
            Transition::BeginWrite => state.pending_writes += 1,
            Transition::EndWrite => state.pending_writes = state.pending_writes.saturating_sub(1),
        }

        if revalidate {
            let issues = analyze(&self.state.nodes);
            self.apply(Transition::SetGraphIssues(issues));
        }
    }
}

struct StoreShared {
    store: Mutex<StateStore>,
    updates: watch::Sender<StoryState>,
}

/// Cloneable handle to a shared [`StateStore`].
///
/// Dispatches are serialized by a lock that is never held across an await,
/// so transitions land in arrival order. Observers get a fresh snapshot after
/// every dispatch.
#[derive(Clone)]
pub struct StoreHandle {
    shared: Arc<StoreShared>,
}

impl StoreHandle {
    /// Share a store.
    pub fn new(store: StateStore) -> Self {
        let (updates, _) = watch::channel(store.state().clone());
        Self {
            shared: Arc::new(StoreShared {
                store: Mutex::new(store),
                updates,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StateStore> {
        self.shared
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a transition and notify observers.
    ///
    /// The snapshot is published before the lock is released, so observers
    /// see snapshots in the order the transitions were applied.
    pub fn dispatch(&self, transition: Transition) {
        let mut store = self.lock();
        store.apply(transition);
        self.shared.updates.send_replace(store.state().clone());
    }

    /// Read from the current state without cloning all of it.
    pub fn read<R>(&self, f: impl FnOnce(&StoryState) -> R) -> R {
        f(self.lock().state())
    }

    /// Clone the current state.
    pub fn snapshot(&self) -> StoryState {
        self.read(StoryState::clone)
    }

    /// Receive a snapshot after every dispatch.
    pub fn subscribe(&self) -> watch::Receiver<StoryState> {
        self.shared.updates.subscribe()
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle").finish_non_exhaustive()
    }
}
