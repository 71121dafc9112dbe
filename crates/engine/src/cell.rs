//! Cell records and the table that owns them.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::cell_id::CellId;
use crate::formula::Ast;
use crate::undo::UndoLog;

/// Engine-owned record for one cell.
///
/// A record exists as soon as anything references the cell, even with no
/// formula, so it can carry the back-edge set. `value` is the cached
/// result of the last evaluation; empty cells cache 0.
#[derive(Clone, Debug, PartialEq)]
pub struct CellInfo {
    pub id: CellId,
    pub ast: Option<Ast>,
    pub value: f64,
    /// Cells whose formulas reference this cell.
    pub dependents: FxHashSet<CellId>,
}

impl CellInfo {
    fn new(id: CellId) -> Self {
        CellInfo {
            id,
            ast: None,
            value: 0.0,
            dependents: FxHashSet::default(),
        }
    }

    /// True when the record only exists to carry back edges that are now
    /// gone.
    pub fn is_dead(&self) -> bool {
        self.ast.is_none() && self.dependents.is_empty()
    }
}

/// Owner of all live cells.
///
/// Every mutation goes through [`CellTable::update`] or
/// [`CellTable::remove_if_dead`], so the undo log sees the pre-image of
/// each touched cell exactly once per operation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CellTable {
    cells: FxHashMap<CellId, CellInfo>,
}

impl CellTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookup without side effects.
    pub fn get(&self, id: CellId) -> Option<&CellInfo> {
        self.cells.get(&id)
    }

    /// Stage undo for `id`, creating the cell empty if absent, then apply
    /// `f` to the live record.
    pub fn update(&mut self, undo: &mut UndoLog, id: CellId, f: impl FnOnce(&mut CellInfo)) {
        undo.stage(id, self.cells.get(&id));
        let info = self.cells.entry(id).or_insert_with(|| CellInfo::new(id));
        f(info);
    }

    /// Erase `id` iff it is empty and nothing depends on it.
    pub fn remove_if_dead(&mut self, undo: &mut UndoLog, id: CellId) {
        if self.cells.get(&id).is_some_and(CellInfo::is_dead) {
            undo.stage(id, self.cells.get(&id));
            self.cells.remove(&id);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellId, &CellInfo)> {
        self.cells.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Drop every record. Used by `clear`, which records no undos.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Put back the pre-image of one cell (`None` removes it). Only the
    /// undo log calls this.
    pub(crate) fn restore(&mut self, id: CellId, shadow: Option<CellInfo>) {
        match shadow {
            Some(info) => {
                self.cells.insert(id, info);
            }
            None => {
                self.cells.remove(&id);
            }
        }
    }
}
