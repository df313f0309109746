//! Export guard - serializes a story only when its graph is clean.

use thiserror::Error;
use tracing::{info, warn};

use crate::store::StoryState;

/// Why an export was refused.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Cannot export: Please fix {issue_count} graph issues (Orphans, Dead Ends, Invalid Links).")]
    Blocked { issue_count: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Pretty JSON of the node list, using the persisted field names.
///
/// Graph issues never block editing or saving; they only block this.
pub fn export_story(state: &StoryState) -> Result<String, ExportError> {
    if !state.can_export() {
        let issue_count = state.graph_issues.len();
        warn!(issue_count, "Export blocked by graph issues");
        return Err(ExportError::Blocked { issue_count });
    }

    let json = serde_json::to_string_pretty(&state.nodes)?;
    info!(count = state.nodes.len(), "Story exported");
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{StateStore, Transition};
    use story_model::{GameChoice, StoryNode};

    fn store_with(nodes: Vec<StoryNode>) -> StateStore {
        let mut store = StateStore::new(StoryNode::empty("start_node"));
        store.apply(Transition::SetNodes(nodes));
        store
    }

    #[test]
    fn test_export_blocked_by_issues() {
        let store = store_with(vec![StoryNode::new("a", "Lonely", "")]);
        let err = export_story(store.state()).unwrap_err();
        assert!(matches!(err, ExportError::Blocked { issue_count: 1 }));
        assert_eq!(
            err.to_string(),
            "Cannot export: Please fix 1 graph issues (Orphans, Dead Ends, Invalid Links)."
        );
    }

    #[test]
    fn test_export_clean_graph() {
        let store = store_with(vec![
            StoryNode::new("a", "Gate", "").with_choice(GameChoice::new("c1", "In").with_target("b")),
            StoryNode::new("b", "Hall", "").with_choice(GameChoice::new("c2", "End")),
        ]);

        let json = export_story(store.state()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["choices"][0]["nextNodeId"], "b");
        assert_eq!(value[1]["choices"][0]["nextNodeId"], "");
        assert!(json.contains('\n'));
    }
}
