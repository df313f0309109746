//! Choices and the stat adjustments they carry.

use serde::{Deserialize, Serialize};

use super::{generate_id, NodeId};
use crate::{CustomStat, ModelError, ModelResult};

/// A branching path out of a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameChoice {
    /// Unique within the owning scene.
    pub id: String,

    /// Button label shown to the player.
    #[serde(default)]
    pub text: String,

    /// Target scene. `None` is the terminal marker, persisted as `""`.
    #[serde(default, with = "terminal_marker")]
    pub next_node_id: Option<NodeId>,

    #[serde(default)]
    pub adjustments: Vec<StatAdjustment>,
}

impl GameChoice {
    /// Create an open (unlinked) choice.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            next_node_id: None,
            adjustments: Vec::new(),
        }
    }

    /// Create an open choice with a freshly generated id.
    pub fn new_open(text: impl Into<String>) -> Self {
        Self::new(generate_id("choice"), text)
    }

    /// Set the target scene.
    pub fn with_target(mut self, target: impl Into<NodeId>) -> Self {
        self.next_node_id = Some(target.into());
        self
    }

    /// Add a stat adjustment.
    pub fn with_adjustment(mut self, adjustment: StatAdjustment) -> Self {
        self.adjustments.push(adjustment);
        self
    }

    /// Whether this choice intentionally ends the path.
    pub fn is_terminal(&self) -> bool {
        self.next_node_id.is_none()
    }

    /// Get a mutable adjustment by position.
    pub fn adjustment_mut(&mut self, index: usize) -> ModelResult<&mut StatAdjustment> {
        let length = self.adjustments.len();
        self.adjustments
            .get_mut(index)
            .ok_or(ModelError::index_out_of_bounds(index, length))
    }

    /// Remove an adjustment by position.
    pub fn remove_adjustment(&mut self, index: usize) -> ModelResult<StatAdjustment> {
        if index >= self.adjustments.len() {
            return Err(ModelError::index_out_of_bounds(
                index,
                self.adjustments.len(),
            ));
        }
        Ok(self.adjustments.remove(index))
    }
}

/// A numeric change applied to a named stat when a choice is taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatAdjustment {
    /// Not checked against the catalog on write.
    pub stat_name: String,
    pub value: i32,
}

impl StatAdjustment {
    /// Create an adjustment of `value` to the named stat.
    pub fn new(stat_name: impl Into<String>, value: i32) -> Self {
        Self {
            stat_name: stat_name.into(),
            value,
        }
    }

    /// True when the referenced stat is missing from the catalog.
    ///
    /// Stale references are kept on the choice; callers decide how to show them.
    pub fn is_dangling(&self, catalog: &[CustomStat]) -> bool {
        !catalog.iter().any(|s| s.name == self.stat_name)
    }
}

/// Maps `Option<NodeId>` to the persisted `""` terminal marker.
mod terminal_marker {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::NodeId;

    pub fn serialize<S>(value: &Option<NodeId>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value.as_ref().map(NodeId::as_str).unwrap_or(""))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NodeId>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.filter(|s| !s.is_empty()).map(NodeId))
    }
}
