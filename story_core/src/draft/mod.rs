//! Edit drafts - private working copies of a node.
//!
//! An open editor never mutates the store directly. Edits land on a
//! [`NodeDraft`] and mark it dirty; [`EditSession`] decides when the draft is
//! committed back through the orchestrator.

mod session;

pub use session::*;

use story_model::{CustomStat, GameChoice, ModelResult, NodeId, StatAdjustment, StoryNode};

/// A working copy of one node plus its dirty flag.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDraft {
    node: StoryNode,
    dirty: bool,
}

impl NodeDraft {
    /// Start a clean draft from the authoritative node.
    pub fn new(node: StoryNode) -> Self {
        Self { node, dirty: false }
    }

    /// The draft node as edited so far.
    pub fn node(&self) -> &StoryNode {
        &self.node
    }

    /// Id of the node being drafted.
    pub fn id(&self) -> &NodeId {
        &self.node.id
    }

    /// Unsaved changes are pending.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Take a copy for committing and mark the draft clean.
    pub fn take_for_commit(&mut self) -> Option<StoryNode> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(self.node.clone())
    }

    /// Apply a fallible edit. The draft is marked dirty only on success.
    fn edit<R>(&mut self, f: impl FnOnce(&mut StoryNode) -> ModelResult<R>) -> ModelResult<R> {
        let result = f(&mut self.node)?;
        self.dirty = true;
        Ok(result)
    }

    /// Replace the title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.node.title = title.into();
        self.dirty = true;
    }

    /// Replace the Markdown content.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.node.content = content.into();
        self.dirty = true;
    }

    /// Append an open choice with a fresh id. Returns its index.
    pub fn add_choice(&mut self, text: impl Into<String>) -> usize {
        self.node.choices.push(GameChoice::new_open(text));
        self.dirty = true;
        self.node.choices.len() - 1
    }

    /// Relabel a choice.
    pub fn update_choice_text(&mut self, index: usize, text: impl Into<String>) -> ModelResult<()> {
        let text = text.into();
        self.edit(|n| {
            n.choice_mut(index)?.text = text;
            Ok(())
        })
    }

    /// Point a choice at a node, or `None` to make it terminal.
    pub fn set_choice_target(&mut self, index: usize, target: Option<NodeId>) -> ModelResult<()> {
        self.edit(|n| {
            n.choice_mut(index)?.next_node_id = target;
            Ok(())
        })
    }

    /// Remove a choice by position.
    pub fn remove_choice(&mut self, index: usize) -> ModelResult<GameChoice> {
        self.edit(|n| n.remove_choice(index))
    }

    /// Add a +1 adjustment for the first catalog stat (or an empty name).
    pub fn add_adjustment(&mut self, choice: usize, catalog: &[CustomStat]) -> ModelResult<usize> {
        let stat_name = catalog.first().map(|s| s.name.clone()).unwrap_or_default();
        self.edit(|n| {
            let adjustments = &mut n.choice_mut(choice)?.adjustments;
            adjustments.push(StatAdjustment::new(stat_name, 1));
            Ok(adjustments.len() - 1)
        })
    }

    /// Replace an adjustment on a choice.
    pub fn update_adjustment(
        &mut self,
        choice: usize,
        index: usize,
        adjustment: StatAdjustment,
    ) -> ModelResult<()> {
        self.edit(|n| {
            *n.choice_mut(choice)?.adjustment_mut(index)? = adjustment;
            Ok(())
        })
    }

    /// Remove an adjustment from a choice.
    pub fn remove_adjustment(&mut self, choice: usize, index: usize) -> ModelResult<StatAdjustment> {
        self.edit(|n| n.choice_mut(choice)?.remove_adjustment(index))
    }
}
