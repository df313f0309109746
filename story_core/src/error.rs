//! Error taxonomy for the editor core.

use story_model::{ModelError, NodeId};
use thiserror::Error;

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::export::ExportError;
use crate::gateway::GatewayError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Message recorded when a story cannot be read.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load story from persistence.";
/// Message recorded when a node or the stat catalog cannot be written.
pub const SAVE_FAILED_MESSAGE: &str = "Failed to save node to persistence.";
/// Message recorded when a remote delete fails.
pub const DELETE_FAILED_MESSAGE: &str = "Failed to delete node from persistence.";

/// Errors surfaced by the sync layer.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Reading the story failed. Local state keeps what it had.
    #[error("Load failed: {0}")]
    LoadFailure(#[source] GatewayError),

    /// A write failed. The optimistic local change is kept.
    #[error("Save failed: {0}")]
    SaveFailure(#[source] GatewayError),

    /// A remote delete failed. The node stays removed locally.
    #[error("Delete failed: {0}")]
    DeleteFailure(#[source] GatewayError),

    /// Rejected before any state change.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl EngineError {
    /// The message shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::LoadFailure(_) => LOAD_FAILED_MESSAGE.to_string(),
            EngineError::SaveFailure(_) => SAVE_FAILED_MESSAGE.to_string(),
            EngineError::DeleteFailure(_) => DELETE_FAILED_MESSAGE.to_string(),
            EngineError::Auth(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

impl From<ModelError> for EngineError {
    fn from(e: ModelError) -> Self {
        EngineError::Validation(e.into())
    }
}

/// Input rejected by a guard.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Cannot delete the last node.")]
    LastNode,

    #[error("Stat '{0}' already exists.")]
    DuplicateStat(String),

    #[error("Stat name cannot be empty.")]
    EmptyStatName,

    #[error("Node not found: {0}")]
    UnknownNode(NodeId),

    #[error("No node is open for editing.")]
    NoOpenDraft,

    #[error("Index {index} out of bounds for list of length {length}")]
    IndexOutOfBounds { index: usize, length: usize },
}

impl From<ModelError> for ValidationError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::EmptyStatName => ValidationError::EmptyStatName,
            ModelError::IndexOutOfBounds { index, length } => {
                ValidationError::IndexOutOfBounds { index, length }
            }
        }
    }
}
