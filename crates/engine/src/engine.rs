//! The engine: public operations over the cell table, undo log, and
//! store.
//!
//! Every mutating operation is a three-phase transaction: parse & stage,
//! mutate memory, persist. A failure in any phase rewinds memory through
//! the undo log before the error is returned, so callers only ever
//! observe the pre-state or the fully updated post-state.

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::cell::CellTable;
use crate::cell_id::CellId;
use crate::error::{EngineError, Result};
use crate::eval::{eval_from_root, remove_as_dependent, Updates};
use crate::formula::{ast_to_string, parse, Ast};
use crate::store::{MemStore, SheetStore, StoreError};
use crate::undo::UndoLog;

/// Value and printed formula of one cell, as returned by `query`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CellContent {
    pub value: f64,
    pub formula: String,
}

/// A live sheet: the cell table, its undo log, and the persistence
/// handle.
pub struct Engine {
    name: String,
    cells: CellTable,
    undo: UndoLog,
    store: Box<dyn SheetStore>,
}

impl Engine {
    /// Open the named sheet, replaying every persisted formula.
    ///
    /// Replay order does not matter: each formula is a full transactional
    /// eval against the cells already loaded, and the store holds ground
    /// facts only.
    pub fn make(name: impl Into<String>, store: Box<dyn SheetStore>) -> Result<Engine> {
        let mut engine = Engine {
            name: name.into(),
            cells: CellTable::new(),
            undo: UndoLog::new(),
            store,
        };
        let rows = engine
            .store
            .read_formulas(&engine.name)
            .map_err(db_error)?;
        for (cell, formula) in rows {
            let id: CellId = cell.parse()?;
            engine.eval_cell(id, &formula, false)?;
        }
        Ok(engine)
    }

    /// A sheet backed by the in-memory store.
    pub fn in_memory(name: impl Into<String>) -> Result<Engine> {
        Engine::make(name, Box::new(MemStore::new()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Install `formula` on `cell`, recompute it and everything that
    /// transitively depends on it, and persist. Returns every recomputed
    /// value.
    pub fn eval(&mut self, cell: &str, formula: &str) -> Result<Updates> {
        self.eval_cell(cell.parse()?, formula, true)
    }

    fn eval_cell(&mut self, target: CellId, formula: &str, update_store: bool) -> Result<Updates> {
        let ast = parse(formula, target)?;
        self.undo.reset();
        let updates = match self.install_and_eval(target, ast) {
            Ok(updates) => updates,
            Err(err) => {
                self.undo.restore_into(&mut self.cells);
                return Err(err);
            }
        };
        if update_store {
            if let Err(err) = self
                .store
                .update_cell(&self.name, &target.to_string(), formula)
            {
                self.undo.restore_into(&mut self.cells);
                return Err(db_error(err));
            }
        }
        Ok(updates)
    }

    fn install_and_eval(&mut self, target: CellId, ast: Ast) -> Result<Updates> {
        if let Some(old) = self.cells.get(target).and_then(|c| c.ast.clone()) {
            remove_as_dependent(&mut self.cells, &mut self.undo, target, &old);
        }
        self.cells.update(&mut self.undo, target, |c| c.ast = Some(ast));
        eval_from_root(&mut self.cells, &mut self.undo, target)
    }

    /// Cached value and printed formula. Unknown and empty cells read as
    /// value 0 with an empty formula.
    pub fn query(&self, cell: &str) -> Result<CellContent> {
        self.query_id(cell.parse()?)
    }

    fn query_id(&self, id: CellId) -> Result<CellContent> {
        match self.cells.get(id) {
            Some(info) => match &info.ast {
                Some(ast) => Ok(CellContent {
                    value: info.value,
                    formula: ast_to_string(ast, id)?,
                }),
                None => Ok(CellContent::default()),
            },
            None => Ok(CellContent::default()),
        }
    }

    /// Drop the formula on `cell` and propagate the resulting zero
    /// through its dependents. Deleting an empty or unknown cell is a
    /// no-op that still clears the persisted entry.
    pub fn delete(&mut self, cell: &str) -> Result<Updates> {
        let id: CellId = cell.parse()?;
        self.undo.reset();

        let Some(old) = self.cells.get(id).and_then(|c| c.ast.clone()) else {
            self.store
                .delete(&self.name, &id.to_string())
                .map_err(db_error)?;
            return Ok(Updates::new());
        };

        let updates = match self.clear_and_eval(id, &old) {
            Ok(updates) => updates,
            Err(err) => {
                self.undo.restore_into(&mut self.cells);
                return Err(err);
            }
        };
        if let Err(err) = self.store.delete(&self.name, &id.to_string()) {
            self.undo.restore_into(&mut self.cells);
            return Err(db_error(err));
        }
        Ok(updates)
    }

    fn clear_and_eval(&mut self, id: CellId, old: &Ast) -> Result<Updates> {
        remove_as_dependent(&mut self.cells, &mut self.undo, id, old);
        self.cells.update(&mut self.undo, id, |c| c.ast = None);
        let updates = eval_from_root(&mut self.cells, &mut self.undo, id)?;
        self.cells.remove_if_dead(&mut self.undo, id);
        Ok(updates)
    }

    /// Copy the formula from `src` to `dest`, rebasing relative
    /// references against the destination. A source without a formula
    /// copies emptiness: the destination is deleted.
    pub fn copy(&mut self, dest: &str, src: &str) -> Result<Updates> {
        let dest_id: CellId = dest.parse()?;
        let src_id: CellId = src.parse()?;
        match self.cells.get(src_id).and_then(|c| c.ast.clone()) {
            Some(ast) => {
                let formula = ast_to_string(&ast, dest_id)?;
                self.eval_cell(dest_id, &formula, true)
            }
            None => self.delete(dest),
        }
    }

    /// Wipe every cell and the persisted sheet. Not undoable.
    pub fn clear(&mut self) -> Result<()> {
        self.cells.clear();
        self.undo.reset();
        self.store.clear(&self.name).map_err(db_error)
    }

    /// Non-empty cells in dependency order: shallowest first, and within
    /// a depth layer in canonical cell order.
    pub fn dump(&self) -> Result<Vec<(CellId, String)>> {
        let mut out = Vec::new();
        for id in self.topo_order() {
            if let Some(ast) = self.cells.get(id).and_then(|c| c.ast.as_ref()) {
                out.push((id, ast_to_string(ast, id)?));
            }
        }
        Ok(out)
    }

    /// Kahn-layered ordering over non-empty cells. A prerequisite of C is
    /// any non-empty cell whose dependents include C; a cell is emitted
    /// once all its prerequisites are, which yields
    /// depth = 1 + max(prerequisite depths).
    fn topo_order(&self) -> Vec<CellId> {
        let non_empty: FxHashSet<CellId> = self
            .cells
            .iter()
            .filter(|(_, info)| info.ast.is_some())
            .map(|(id, _)| *id)
            .collect();

        let mut pending: FxHashMap<CellId, usize> =
            non_empty.iter().map(|&id| (id, 0)).collect();
        for &prereq in &non_empty {
            if let Some(info) = self.cells.get(prereq) {
                for dep in &info.dependents {
                    if let Some(count) = pending.get_mut(dep) {
                        *count += 1;
                    }
                }
            }
        }

        let mut layer: Vec<CellId> = pending
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(&id, _)| id)
            .collect();
        layer.sort_unstable();

        let mut ordered = Vec::with_capacity(non_empty.len());
        while !layer.is_empty() {
            ordered.extend_from_slice(&layer);
            let mut next = Vec::new();
            for &emitted in &layer {
                if let Some(info) = self.cells.get(emitted) {
                    for dep in &info.dependents {
                        if let Some(count) = pending.get_mut(dep) {
                            *count -= 1;
                            if *count == 0 {
                                next.push(*dep);
                            }
                        }
                    }
                }
            }
            next.sort_unstable();
            layer = next;
        }

        debug_assert_eq!(ordered.len(), non_empty.len(), "refers-to graph must be acyclic");
        ordered
    }

    /// Query results for `ids`, defaulting to every non-empty cell in
    /// dump order.
    pub fn value_formulas(&self, ids: Option<&[CellId]>) -> Result<BTreeMap<CellId, CellContent>> {
        let ids: Vec<CellId> = match ids {
            Some(ids) => ids.to_vec(),
            None => self.dump()?.into_iter().map(|(id, _)| id).collect(),
        };
        let mut out = BTreeMap::new();
        for id in ids {
            out.insert(id, self.query_id(id)?);
        }
        Ok(out)
    }

    /// Release the store handle.
    pub fn close(mut self) -> Result<()> {
        self.store.close().map_err(db_error)
    }
}

fn db_error(err: StoreError) -> EngineError {
    EngineError::Db(err.to_string())
}
