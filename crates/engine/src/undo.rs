//! Per-operation undo log.

use rustc_hash::FxHashMap;

use crate::cell::{CellInfo, CellTable};
use crate::cell_id::CellId;

/// Shadow map of the cells touched by the current public operation.
///
/// The first touch of a cell snapshots its prior state (`None` when the
/// cell did not exist). `reset` runs at the start of every mutating
/// operation; on failure `restore_into` rewinds the table to exactly its
/// pre-operation state. On success the log is simply discarded by the
/// next `reset`.
#[derive(Debug, Default)]
pub struct UndoLog {
    shadows: FxHashMap<CellId, Option<CellInfo>>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all snapshots.
    pub fn reset(&mut self) {
        self.shadows.clear();
    }

    /// Record the pre-image of `id` unless this operation already touched
    /// it.
    pub fn stage(&mut self, id: CellId, prior: Option<&CellInfo>) {
        self.shadows.entry(id).or_insert_with(|| prior.cloned());
    }

    /// Rewind every touched cell to its snapshot.
    pub fn restore_into(&mut self, cells: &mut CellTable) {
        for (id, shadow) in self.shadows.drain() {
            cells.restore(id, shadow);
        }
    }

    #[cfg(test)]
    pub(crate) fn staged_count(&self) -> usize {
        self.shadows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::Ast;

    fn id(s: &str) -> CellId {
        s.parse().unwrap()
    }

    #[test]
    fn test_restore_rewinds_to_first_touch() {
        let mut table = CellTable::new();
        let mut undo = UndoLog::new();

        table.update(&mut undo, id("a1"), |c| c.value = 1.0);
        undo.reset();

        // Two touches within one operation; the snapshot is the state at
        // the first touch.
        table.update(&mut undo, id("a1"), |c| c.value = 2.0);
        table.update(&mut undo, id("a1"), |c| c.value = 3.0);
        assert_eq!(undo.staged_count(), 1);

        undo.restore_into(&mut table);
        assert_eq!(table.get(id("a1")).unwrap().value, 1.0);
    }

    #[test]
    fn test_restore_removes_cells_created_during_operation() {
        let mut table = CellTable::new();
        let mut undo = UndoLog::new();

        table.update(&mut undo, id("b2"), |c| c.ast = Some(Ast::Num(5.0)));
        undo.restore_into(&mut table);
        assert!(table.get(id("b2")).is_none());
    }

    #[test]
    fn test_restore_brings_back_removed_cells() {
        let mut table = CellTable::new();
        let mut undo = UndoLog::new();

        table.update(&mut undo, id("a1"), |c| c.value = 4.0);
        undo.reset();

        table.update(&mut undo, id("a1"), |c| {
            c.ast = None;
            c.dependents.clear();
        });
        table.remove_if_dead(&mut undo, id("a1"));
        assert!(table.get(id("a1")).is_none());

        undo.restore_into(&mut table);
        assert_eq!(table.get(id("a1")).unwrap().value, 4.0);
    }
}
