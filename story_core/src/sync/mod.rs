//! Sync Orchestrator - use cases coordinating the store and the gateway.
//!
//! Every operation follows the same shape:
//! 1. **Local**: dispatch the optimistic transition synchronously
//! 2. **Remote**: issue the gateway call
//! 3. **Settle**: dispatch the outcome (`error` cleared or set)
//!
//! Failed writes are never rolled back. Completions are not sequenced, so two
//! overlapping saves of one node may land remotely in either order.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use story_model::{default_stat_catalog, slugify_stat_name, CustomStat, NodeId, StatKind, StoryNode};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthProvider, Subscription, User};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, ValidationError};
use crate::gateway::{GatewayError, GatewayResult, PersistenceGateway, Scope};
use crate::store::{StateStore, StoreHandle, StoryState, Transition};

/// Coordinates load, save, delete and add against the store and the gateway.
///
/// Cheap to clone; clones share the store, gateway and signed-in scope.
#[derive(Clone)]
pub struct SyncOrchestrator {
    store: StoreHandle,
    gateway: Arc<dyn PersistenceGateway>,
    config: Arc<EngineConfig>,
    scope: Arc<Mutex<Option<Scope>>>,
}

impl SyncOrchestrator {
    /// Create an orchestrator with a fresh store seeded with the start node.
    pub fn new(gateway: Arc<dyn PersistenceGateway>, config: EngineConfig) -> Self {
        let start = Self::default_node(&config, NodeId::new(config.start_node_id.clone()));
        Self::with_store(StoreHandle::new(StateStore::new(start)), gateway, config)
    }

    /// Create an orchestrator over an existing store.
    pub fn with_store(
        store: StoreHandle,
        gateway: Arc<dyn PersistenceGateway>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            config: Arc::new(config),
            scope: Arc::new(Mutex::new(None)),
        }
    }

    fn default_node(config: &EngineConfig, id: NodeId) -> StoryNode {
        StoryNode::new(
            id,
            config.default_node_title.clone(),
            config.default_node_content.clone(),
        )
    }

    /// The shared store.
    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// The configuration this orchestrator was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> StoryState {
        self.store.snapshot()
    }

    fn scope_slot(&self) -> MutexGuard<'_, Option<Scope>> {
        self.scope.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The current (user, story) scope, if anyone is signed in.
    pub fn scope(&self) -> Option<Scope> {
        self.scope_slot().clone()
    }

    /// Install or clear the signed-in user. Without a user every gateway call
    /// becomes a no-op.
    pub fn set_user(&self, user: Option<&User>) {
        let scope = user.map(|u| Scope::new(u.uid.clone(), self.config.story_id.clone()));
        info!(user = ?scope.as_ref().map(|s| s.user_id.as_str()), "Auth scope changed");
        *self.scope_slot() = scope;
    }

    /// Keep the scope in step with an auth provider.
    pub fn follow_auth(&self, provider: &dyn AuthProvider) -> Subscription {
        self.set_user(provider.current_user().as_ref());
        let this = self.clone();
        provider.subscribe(Arc::new(move |user: Option<&User>| this.set_user(user)))
    }

    /// Switch user and load their story and stat catalog.
    pub async fn switch_user(&self, user: Option<&User>) -> EngineResult<()> {
        self.set_user(user);
        if user.is_none() {
            return Ok(());
        }
        self.load_story().await?;
        self.load_stats().await
    }

    /// Change focus. `None` clears it.
    pub fn select_node(&self, id: Option<NodeId>) {
        self.store.dispatch(Transition::SelectNode(id));
    }

    // =========================================================================
    // LOAD
    // =========================================================================

    /// Fetch the story. An empty story is seeded with one start node, which is
    /// persisted before it is installed.
    pub async fn load_story(&self) -> EngineResult<()> {
        self.store.dispatch(Transition::SetLoading(true));
        let result = self.load_story_inner().await;
        if let Err(e) = &result {
            error!(error = %e, "Load failed");
            self.store.dispatch(Transition::SetError(Some(e.user_message())));
            self.store.dispatch(Transition::SetLoadFailed(true));
        }
        self.store.dispatch(Transition::SetLoading(false));
        result
    }

    async fn load_story_inner(&self) -> EngineResult<()> {
        let scope = self.scope();
        let nodes = match &scope {
            Some(scope) => self
                .gateway
                .fetch_nodes(scope)
                .await
                .map_err(EngineError::LoadFailure)?,
            None => Vec::new(),
        };

        let nodes = if nodes.is_empty() {
            let seed = vec![Self::default_node(
                &self.config,
                NodeId::new(self.config.start_node_id.clone()),
            )];
            if let Some(scope) = &scope {
                self.gateway
                    .save_bulk(scope, &seed)
                    .await
                    .map_err(EngineError::LoadFailure)?;
            }
            info!("Seeded empty story with a start node");
            seed
        } else {
            info!(count = nodes.len(), "Loaded story");
            nodes
        };

        let first = nodes.first().map(|n| n.id.clone());
        self.store.dispatch(Transition::SetNodes(nodes));
        self.store.dispatch(Transition::SelectNode(first));
        self.store.dispatch(Transition::SetError(None));
        Ok(())
    }

    /// Fetch the stat catalog, installing the built-in one for a story that
    /// has none.
    pub async fn load_stats(&self) -> EngineResult<()> {
        let Some(scope) = self.scope() else {
            return Ok(());
        };

        let stats = match self.gateway.fetch_stat_config(&scope).await {
            Ok(stats) => stats,
            Err(e) => {
                let err = EngineError::LoadFailure(e);
                error!(error = %err, "Stat config load failed");
                self.store.dispatch(Transition::SetError(Some(err.user_message())));
                return Err(err);
            }
        };

        if stats.is_empty() && self.config.seed_default_stats {
            let defaults = default_stat_catalog();
            self.store.dispatch(Transition::SetStats(defaults.clone()));
            return self
                .remote_write(self.gateway.save_stat_config(&scope, &defaults))
                .await
                .map_err(|e| self.settle_failure(EngineError::SaveFailure(e)));
        }

        debug!(count = stats.len(), "Loaded stat catalog");
        self.store.dispatch(Transition::SetStats(stats));
        Ok(())
    }

    // =========================================================================
    // NODE WRITES
    // =========================================================================

    /// Optimistic save: the local upsert lands before the remote write is
    /// attempted and is kept if the write fails.
    pub async fn save_node(&self, node: StoryNode) -> EngineResult<()> {
        self.store.dispatch(Transition::UpsertNode(node.clone()));
        self.persist_node(&node).await
    }

    /// Upsert `node` locally now and write it remotely on a detached task.
    ///
    /// Returns as soon as the store holds the node. The handle resolves with
    /// the remote outcome, which is also recorded in the store's `error`.
    pub fn commit_node(&self, node: StoryNode) -> JoinHandle<EngineResult<()>> {
        self.store.dispatch(Transition::UpsertNode(node.clone()));
        let this = self.clone();
        tokio::spawn(async move { this.persist_node(&node).await })
    }

    async fn persist_node(&self, node: &StoryNode) -> EngineResult<()> {
        let Some(scope) = self.scope() else {
            debug!(node_id = %node.id, "No user; skipping remote save");
            return Ok(());
        };

        match self.remote_write(self.gateway.save_node(&scope, node)).await {
            Ok(()) => {
                debug!(node_id = %node.id, "Saved node");
                self.store.dispatch(Transition::SetError(None));
                Ok(())
            }
            Err(e) => {
                warn!(node_id = %node.id, error = %e, "Save failed; keeping local edit");
                Err(self.settle_failure(EngineError::SaveFailure(e)))
            }
        }
    }

    /// Add a scene, optionally auto-linking it from `parent_id`.
    ///
    /// Only the parent's first open choice is rewritten. A parent with no open
    /// choice is left untouched and the new scene starts unlinked.
    ///
    /// The new scene is added and saved even when saving the parent failed.
    /// That later save clears the store's `error`, so the parent failure is
    /// only reported through the returned `Err(SaveFailure)`.
    pub async fn add_node(&self, parent_id: Option<&NodeId>) -> EngineResult<NodeId> {
        let new_node = Self::default_node(&self.config, NodeId::generate());
        let new_id = new_node.id.clone();
        let mut first_error = None;

        if let Some(parent_id) = parent_id {
            let parent = self.store.read(|s| s.node(parent_id).cloned());
            match parent {
                Some(mut parent) => {
                    if parent.link_first_open_choice(&new_id) {
                        debug!(parent = %parent_id, node_id = %new_id, "Auto-linked new node");
                        first_error = self.save_node(parent).await.err();
                    }
                }
                None => debug!(parent = %parent_id, "Parent not found; adding unlinked"),
            }
        }

        self.store.dispatch(Transition::AddNode(new_node.clone()));
        let saved = self.persist_node(&new_node).await;

        match first_error {
            Some(e) => Err(e),
            None => saved.map(|()| new_id),
        }
    }

    /// Remove a scene. Refused when it is the last one; a failed remote
    /// delete leaves it removed locally.
    pub async fn delete_node(&self, id: &NodeId) -> EngineResult<()> {
        let (count, exists) = self.store.read(|s| (s.nodes.len(), s.node(id).is_some()));
        if count <= 1 {
            let err = EngineError::from(ValidationError::LastNode);
            self.store.dispatch(Transition::SetError(Some(err.user_message())));
            return Err(err);
        }
        if !exists {
            return Err(ValidationError::UnknownNode(id.clone()).into());
        }

        self.store.dispatch(Transition::DeleteNode(id.clone()));

        let Some(scope) = self.scope() else {
            return Ok(());
        };
        match self.remote_write(self.gateway.delete_node(&scope, id)).await {
            Ok(()) => {
                info!(node_id = %id, "Deleted node");
                self.store.dispatch(Transition::SetError(None));
                Ok(())
            }
            Err(e) => {
                warn!(node_id = %id, error = %e, "Delete failed; node stays removed locally");
                Err(self.settle_failure(EngineError::DeleteFailure(e)))
            }
        }
    }

    // =========================================================================
    // STAT CATALOG
    // =========================================================================

    /// Add a stat under its slugified name.
    ///
    /// Empty or duplicate names are rejected without touching the store.
    pub async fn add_custom_stat(
        &self,
        raw_name: &str,
        initial_value: i32,
        kind: StatKind,
    ) -> EngineResult<CustomStat> {
        let name = slugify_stat_name(raw_name)?;
        if self.store.read(|s| s.custom_stats.iter().any(|c| c.name == name)) {
            return Err(ValidationError::DuplicateStat(name).into());
        }

        let stat = CustomStat {
            name,
            initial_value,
            kind,
        };
        self.store.dispatch(Transition::AddStat(stat.clone()));
        self.persist_stats().await?;
        Ok(stat)
    }

    /// Remove a stat. Adjustments naming it are left as they are.
    pub async fn delete_custom_stat(&self, name: &str) -> EngineResult<()> {
        self.store.dispatch(Transition::RemoveStat(name.to_string()));
        self.persist_stats().await
    }

    async fn persist_stats(&self) -> EngineResult<()> {
        let Some(scope) = self.scope() else {
            return Ok(());
        };
        let stats = self.store.read(|s| s.custom_stats.clone());

        match self.remote_write(self.gateway.save_stat_config(&scope, &stats)).await {
            Ok(()) => {
                self.store.dispatch(Transition::SetError(None));
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Stat config save failed");
                Err(self.settle_failure(EngineError::SaveFailure(e)))
            }
        }
    }

    // =========================================================================
    // FIRE AND FORGET
    // =========================================================================

    /// Run [`Self::save_node`] as a detached task.
    pub fn spawn_save(&self, node: StoryNode) -> JoinHandle<EngineResult<()>> {
        let this = self.clone();
        tokio::spawn(async move { this.save_node(node).await })
    }

    /// Run [`Self::add_node`] as a detached task.
    pub fn spawn_add(&self, parent_id: Option<NodeId>) -> JoinHandle<EngineResult<NodeId>> {
        let this = self.clone();
        tokio::spawn(async move { this.add_node(parent_id.as_ref()).await })
    }

    /// Run [`Self::delete_node`] as a detached task.
    pub fn spawn_delete(&self, id: NodeId) -> JoinHandle<EngineResult<()>> {
        let this = self.clone();
        tokio::spawn(async move { this.delete_node(&id).await })
    }

    /// Run [`Self::load_story`] as a detached task.
    pub fn spawn_load(&self) -> JoinHandle<EngineResult<()>> {
        let this = self.clone();
        tokio::spawn(async move { this.load_story().await })
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    /// Track a remote write in the store's in-flight counter.
    async fn remote_write(
        &self,
        write: impl Future<Output = GatewayResult<()>>,
    ) -> Result<(), GatewayError> {
        self.store.dispatch(Transition::BeginWrite);
        let result = write.await;
        self.store.dispatch(Transition::EndWrite);
        result
    }

    fn settle_failure(&self, err: EngineError) -> EngineError {
        self.store.dispatch(Transition::SetError(Some(err.user_message())));
        err
    }
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("scope", &self.scope())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
