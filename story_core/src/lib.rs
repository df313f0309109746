//! # Story Core
//!
//! The editor engine of Threadr. It owns the authoritative story state, keeps
//! graph diagnostics current, and synchronizes edits with a persistence
//! backend without blocking the editor on remote writes.
//!
//! ## Core Components
//!
//! - **store**: `StoryState` and the transitions applied to it
//! - **gateway**: the persistence contract and an in-memory backend
//! - **sync**: the orchestrator behind every editor intent
//! - **draft**: node drafts and debounced autosave
//! - **auth**: sign-in provider contract and observer registry
//! - **export**: JSON export, refused while the graph has issues

pub mod auth;
pub mod config;
pub mod draft;
mod error;
pub mod export;
pub mod gateway;
pub mod store;
pub mod sync;

pub use auth::{AuthError, AuthProvider, AuthSession, AuthState, Subscription, User};
pub use config::{ConfigError, EngineConfig};
pub use draft::{CommitHandle, EditSession, NodeDraft};
pub use error::*;
pub use export::{export_story, ExportError};
pub use gateway::{GatewayError, GatewayResult, MemoryGateway, PersistenceGateway, Scope};
pub use store::{StateStore, StoreHandle, StoryState, SyncStatus, Transition};
pub use sync::SyncOrchestrator;

pub use story_model;
