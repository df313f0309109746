//! In-memory gateway storing JSON records with field-merge upserts.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use story_model::{CustomStat, NodeId, StoryNode};
use tracing::{debug, warn};

use super::{
    GatewayError, GatewayResult, PersistenceGateway, Scope, STAT_CONFIG_FIELD, STAT_CONFIG_RECORD,
};

/// Gateway operations, for call logs and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    FetchNodes,
    SaveNode,
    DeleteNode,
    FetchStatConfig,
    SaveStatConfig,
}

/// Ordered keyed records of one collection.
type Collection = Vec<(String, Value)>;

/// A backend-agnostic reference gateway.
///
/// Records live under collection paths derived from the [`Scope`], keep
/// insertion order, and are merged field by field on upsert: objects merge
/// recursively, arrays and scalars are replaced.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    collections: Mutex<BTreeMap<String, Collection>>,
    failing: Mutex<HashSet<GatewayOp>>,
    calls: Mutex<Vec<(GatewayOp, String)>>,
    latency: Mutex<Duration>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Merge `patch` into `target`. Objects merge per key; anything else replaces.
pub fn merge_json(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

impl MemoryGateway {
    /// Create an empty gateway with no latency and no failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `op` fail until cleared.
    pub fn fail(&self, op: GatewayOp) {
        lock(&self.failing).insert(op);
    }

    /// Stop failing `op`.
    pub fn recover(&self, op: GatewayOp) {
        lock(&self.failing).remove(&op);
    }

    /// Delay every call by `latency` before it touches storage.
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = latency;
    }

    /// Every call made so far, with the record key it addressed.
    pub fn calls(&self) -> Vec<(GatewayOp, String)> {
        lock(&self.calls).clone()
    }

    /// Number of calls of a given kind.
    pub fn call_count(&self, op: GatewayOp) -> usize {
        lock(&self.calls).iter().filter(|(o, _)| *o == op).count()
    }

    /// Raw stored record, for inspecting merge behaviour.
    pub fn record(&self, path: &str, key: &str) -> Option<Value> {
        lock(&self.collections)
            .get(path)
            .and_then(|c| c.iter().find(|(k, _)| k == key))
            .map(|(_, v)| v.clone())
    }

    /// Write a raw record, merging into any existing one.
    pub fn put_record(&self, path: &str, key: &str, value: Value) {
        let mut collections = lock(&self.collections);
        let collection = collections.entry(path.to_string()).or_default();
        match collection.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => merge_json(existing, value),
            None => collection.push((key.to_string(), value)),
        }
    }

    async fn enter(&self, op: GatewayOp, key: &str) -> GatewayResult<()> {
        let latency = *lock(&self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        lock(&self.calls).push((op, key.to_string()));
        if lock(&self.failing).contains(&op) {
            warn!(?op, key, "Injected gateway failure");
            return Err(GatewayError::unavailable(format!("{:?} failed", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn fetch_nodes(&self, scope: &Scope) -> GatewayResult<Vec<StoryNode>> {
        let path = scope.nodes_path();
        self.enter(GatewayOp::FetchNodes, &path).await?;

        let records: Collection = lock(&self.collections)
            .get(&path)
            .cloned()
            .unwrap_or_default();

        let nodes = records
            .into_iter()
            .map(|(key, mut value)| {
                if let Value::Object(fields) = &mut value {
                    fields.insert("id".to_string(), Value::String(key));
                }
                serde_json::from_value(value)
            })
            .collect::<Result<Vec<StoryNode>, _>>()?;

        debug!(path = %path, count = nodes.len(), "Fetched nodes");
        Ok(nodes)
    }

    async fn save_node(&self, scope: &Scope, node: &StoryNode) -> GatewayResult<()> {
        self.enter(GatewayOp::SaveNode, node.id.as_str()).await?;
        let value = serde_json::to_value(node)?;
        self.put_record(&scope.nodes_path(), node.id.as_str(), value);
        Ok(())
    }

    async fn delete_node(&self, scope: &Scope, id: &NodeId) -> GatewayResult<()> {
        self.enter(GatewayOp::DeleteNode, id.as_str()).await?;
        if let Some(collection) = lock(&self.collections).get_mut(&scope.nodes_path()) {
            collection.retain(|(key, _)| key != id.as_str());
        }
        Ok(())
    }

    async fn fetch_stat_config(&self, scope: &Scope) -> GatewayResult<Vec<CustomStat>> {
        self.enter(GatewayOp::FetchStatConfig, STAT_CONFIG_RECORD).await?;
        let stats = self
            .record(&scope.config_path(), STAT_CONFIG_RECORD)
            .and_then(|mut record| record.get_mut(STAT_CONFIG_FIELD).map(Value::take));

        match stats {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    async fn save_stat_config(&self, scope: &Scope, stats: &[CustomStat]) -> GatewayResult<()> {
        self.enter(GatewayOp::SaveStatConfig, STAT_CONFIG_RECORD).await?;
        let mut record = Map::new();
        record.insert(STAT_CONFIG_FIELD.to_string(), serde_json::to_value(stats)?);
        self.put_record(&scope.config_path(), STAT_CONFIG_RECORD, Value::Object(record));
        Ok(())
    }
}
