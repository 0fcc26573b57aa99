//! Snapshot history for undo/redo.

use indexmap::IndexMap;

use crate::features::{Feature, FeatureId};

/// Full copy of the committed feature map
pub type Snapshot = IndexMap<FeatureId, Feature>;

/// Depth-limited undo/redo stacks of committed-feature snapshots
#[derive(Debug)]
pub struct History {
    /// States that can be restored by undo (most recent last)
    undo_stack: Vec<Snapshot>,
    /// States that can be restored by redo (most recent last)
    redo_stack: Vec<Snapshot>,
    max_depth: usize,
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_depth: max_depth.max(1),
        }
    }

    /// Push the state that preceded a new change
    pub fn push(&mut self, snapshot: Snapshot) {
        // A new change invalidates everything that was undone
        self.redo_stack.clear();

        self.undo_stack.push(snapshot);

        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
    }

    pub fn pop_undo(&mut self) -> Option<Snapshot> {
        self.undo_stack.pop()
    }

    pub fn pop_redo(&mut self) -> Option<Snapshot> {
        self.redo_stack.pop()
    }

    /// Push the current state to the redo stack (used during undo)
    pub fn push_redo(&mut self, snapshot: Snapshot) {
        self.redo_stack.push(snapshot);
    }

    /// Push the current state to the undo stack (used during redo)
    pub fn push_undo(&mut self, snapshot: Snapshot) {
        self.undo_stack.push(snapshot);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
