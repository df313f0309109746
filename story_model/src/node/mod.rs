//! Scene definitions for the story graph.

mod choice;

pub use choice::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ModelError, ModelResult};

/// Build a fresh identifier of the form `<prefix>_<uuid>`.
pub fn generate_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

/// Identifier of a scene, unique within a story and immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a new random node ID.
    pub fn generate() -> Self {
        Self(generate_id("node"))
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl PartialEq<str> for NodeId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for NodeId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A single scene: a block of narrative plus the choices leading out of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryNode {
    pub id: NodeId,
    #[serde(default)]
    pub title: String,

    /// Markdown text of the scene.
    #[serde(default)]
    pub content: String,

    /// Outbound choices. Order matters for presentation only.
    #[serde(default)]
    pub choices: Vec<GameChoice>,
}

impl StoryNode {
    /// Create a scene with the given id, title and content and no choices.
    pub fn new(id: impl Into<NodeId>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            choices: Vec::new(),
        }
    }

    /// Create an empty scene with only an id.
    pub fn empty(id: impl Into<NodeId>) -> Self {
        Self::new(id, "", "")
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the content.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Append a choice.
    pub fn with_choice(mut self, choice: GameChoice) -> Self {
        self.choices.push(choice);
        self
    }

    /// A scene with no outbound choices ends the story.
    pub fn is_dead_end(&self) -> bool {
        self.choices.is_empty()
    }

    /// Iterate over every non-terminal target referenced by this scene.
    pub fn targets(&self) -> impl Iterator<Item = &NodeId> {
        self.choices.iter().filter_map(|c| c.next_node_id.as_ref())
    }

    /// Point the first open choice at `target`.
    ///
    /// Only one choice is rewritten. Returns `false` when every choice is
    /// already linked, leaving the scene untouched.
    pub fn link_first_open_choice(&mut self, target: &NodeId) -> bool {
        match self.choices.iter_mut().find(|c| c.is_terminal()) {
            Some(choice) => {
                choice.next_node_id = Some(target.clone());
                true
            }
            None => false,
        }
    }

    /// Get a choice by position.
    pub fn choice(&self, index: usize) -> ModelResult<&GameChoice> {
        let length = self.choices.len();
        self.choices
            .get(index)
            .ok_or(ModelError::index_out_of_bounds(index, length))
    }

    /// Get a mutable choice by position.
    pub fn choice_mut(&mut self, index: usize) -> ModelResult<&mut GameChoice> {
        let length = self.choices.len();
        self.choices
            .get_mut(index)
            .ok_or(ModelError::index_out_of_bounds(index, length))
    }

    /// Remove a choice by position.
    pub fn remove_choice(&mut self, index: usize) -> ModelResult<GameChoice> {
        if index >= self.choices.len() {
            return Err(ModelError::index_out_of_bounds(index, self.choices.len()));
        }
        Ok(self.choices.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_prefixed_and_unique() {
        let a = NodeId::generate();
        let b = NodeId::generate();
        assert!(a.as_str().starts_with("node_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_node_builder() {
        let node = StoryNode::new("intro", "The Gate", "You stand before a gate.")
            .with_choice(GameChoice::new("c1", "Knock").with_target("hall"))
            .with_choice(GameChoice::new("c2", "Leave"));

        assert_eq!(node.id, "intro");
        assert_eq!(node.choices.len(), 2);
        assert!(!node.is_dead_end());
        let targets: Vec<_> = node.targets().collect();
        assert_eq!(targets, vec![&NodeId::new("hall")]);
    }

    #[test]
    fn test_link_first_open_choice_rewrites_only_one() {
        let mut node = StoryNode::empty("a")
            .with_choice(GameChoice::new("c1", "Linked").with_target("b"))
            .with_choice(GameChoice::new("c2", "Open"))
            .with_choice(GameChoice::new("c3", "Also open"));

        assert!(node.link_first_open_choice(&NodeId::new("z")));
        assert_eq!(node.choices[0].next_node_id, Some(NodeId::new("b")));
        assert_eq!(node.choices[1].next_node_id, Some(NodeId::new("z")));
        assert!(node.choices[2].is_terminal());
    }

    #[test]
    fn test_link_first_open_choice_without_slot() {
        let mut node =
            StoryNode::empty("a").with_choice(GameChoice::new("c1", "Linked").with_target("b"));
        let before = node.clone();

        assert!(!node.link_first_open_choice(&NodeId::new("z")));
        assert_eq!(node, before);
    }

    #[test]
    fn test_choice_index_errors() {
        let mut node = StoryNode::empty("a");
        assert_eq!(
            node.choice(0).unwrap_err(),
            ModelError::IndexOutOfBounds { index: 0, length: 0 }
        );
        assert!(node.remove_choice(3).is_err());
    }

    #[test]
    fn test_persisted_field_names() {
        let node = StoryNode::new("a", "Title", "Body")
            .with_choice(GameChoice::new("c1", "Go"))
            .with_choice(GameChoice::new("c2", "Stay").with_target("b"));
        let json = serde_json::to_value(&node).unwrap();

        assert_eq!(json["id"], "a");
        assert_eq!(json["choices"][0]["nextNodeId"], "");
        assert_eq!(json["choices"][1]["nextNodeId"], "b");
    }

    #[test]
    fn test_missing_fields_default() {
        let node: StoryNode = serde_json::from_str(r#"{"id":"lonely"}"#).unwrap();
        assert_eq!(node.id, "lonely");
        assert!(node.title.is_empty());
        assert!(node.choices.is_empty());
    }
}
