//! Snapshot history over the modification array.
//!
//! No per-kind inverses: undo and redo swap whole array snapshots, and the
//! caller re-renders from the pristine base document.

use crate::modification::Modification;

pub const DEFAULT_MAX_DEPTH: usize = 50;

#[derive(Debug, Clone)]
pub struct History {
    /// Earlier states, most recent last.
    undo_stack: Vec<Vec<Modification>>,
    /// Undone states, most recent last.
    redo_stack: Vec<Vec<Modification>>,
    /// Maximum number of undo levels (0 = unlimited).
    max_depth: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_depth,
        }
    }

    /// Snapshot `current` before a mutating action. Clears redo.
    pub fn record(&mut self, current: &[Modification]) {
        self.undo_stack.push(current.to_vec());
        if self.max_depth > 0 && self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
    }

    /// Returns the state to restore, pushing `current` onto the redo stack.
    pub fn undo(&mut self, current: &[Modification]) -> Option<Vec<Modification>> {
        let previous = self.undo_stack.pop()?;
        self.redo_stack.push(current.to_vec());
        Some(previous)
    }

    pub fn redo(&mut self, current: &[Modification]) -> Option<Vec<Modification>> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push(current.to_vec());
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modification::{Changes, ModificationKind};

    fn m(id: &str) -> Modification {
        Modification::new(id, "v", "p", ModificationKind::Hide, Changes::default())
    }

    #[test]
    fn test_undo_then_redo_restores_states() {
        let mut history = History::new();
        let s0: Vec<Modification> = vec![];
        let s1 = vec![m("a")];

        history.record(&s0);
        assert_eq!(history.undo(&s1), Some(s0.clone()));
        assert!(history.can_redo());
        assert_eq!(history.redo(&s0), Some(s1));
        assert!(!history.can_redo());
        assert!(history.can_undo());
    }

    #[test]
    fn test_record_clears_redo() {
        let mut history = History::new();
        history.record(&[]);
        history.undo(&[m("a")]);
        history.record(&[]);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_empty_stacks_return_none() {
        let mut history = History::new();
        assert_eq!(history.undo(&[]), None);
        assert_eq!(history.redo(&[]), None);
    }

    #[test]
    fn test_depth_is_bounded() {
        let mut history = History::with_max_depth(3);
        for i in 0..10 {
            history.record(&[m(&i.to_string())]);
        }
        assert_eq!(history.undo_depth(), 3);
        assert_eq!(history.undo(&[]), Some(vec![m("9")]));
    }
}
