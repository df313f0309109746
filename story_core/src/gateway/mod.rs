//! Persistence Gateway - the remote read/write contract.
//!
//! The core never talks to a backend directly. Implementations of
//! [`PersistenceGateway`] are injected into the orchestrator; writes are
//! idempotent field-merging upserts, so retries are safe.

mod memory;

pub use memory::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use story_model::{CustomStat, NodeId, StoryNode};
use thiserror::Error;

/// Result type alias for gateway calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors reported by a persistence backend.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Backend could not be reached or refused the request.
    #[error("Persistence unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GatewayError {
    /// Creates an Unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }
}

/// The (user, story) pair every gateway call is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub user_id: String,
    pub story_id: String,
}

impl Scope {
    /// Scope for one user's story.
    pub fn new(user_id: impl Into<String>, story_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            story_id: story_id.into(),
        }
    }

    /// Collection holding one record per node.
    pub fn nodes_path(&self) -> String {
        format!("users/{}/stories/{}/nodes", self.user_id, self.story_id)
    }

    /// Sibling collection holding the stat configuration record.
    pub fn config_path(&self) -> String {
        format!("users/{}/stories/{}/config", self.user_id, self.story_id)
    }
}

/// Key of the configuration record inside [`Scope::config_path`].
pub const STAT_CONFIG_RECORD: &str = "stats";
/// Array-valued field of the configuration record.
pub const STAT_CONFIG_FIELD: &str = "customStats";

/// Remote storage for a story's nodes and stat catalog.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Fetch every node in persisted order. The first node is the start.
    async fn fetch_nodes(&self, scope: &Scope) -> GatewayResult<Vec<StoryNode>>;

    /// Upsert by id. Fields absent from the record are not cleared.
    async fn save_node(&self, scope: &Scope, node: &StoryNode) -> GatewayResult<()>;

    /// Remove a node record. Deleting a missing record is not an error.
    async fn delete_node(&self, scope: &Scope, id: &NodeId) -> GatewayResult<()>;

    /// Sequential upserts. Not atomic as a batch: a failure leaves earlier
    /// writes in place.
    async fn save_bulk(&self, scope: &Scope, nodes: &[StoryNode]) -> GatewayResult<()> {
        for node in nodes {
            self.save_node(scope, node).await?;
        }
        Ok(())
    }

    /// Fetch the stat catalog. A story without one yields an empty list.
    async fn fetch_stat_config(&self, scope: &Scope) -> GatewayResult<Vec<CustomStat>>;

    /// Replace the whole catalog under the single configuration record.
    async fn save_stat_config(&self, scope: &Scope, stats: &[CustomStat]) -> GatewayResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_paths() {
        let scope = Scope::new("u1", "tale");
        assert_eq!(scope.nodes_path(), "users/u1/stories/tale/nodes");
        assert_eq!(scope.config_path(), "users/u1/stories/tale/config");
    }
}
