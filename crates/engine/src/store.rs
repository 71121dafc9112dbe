//! The persistence seam.
//!
//! The store holds ground facts only: `(cell, formula)` pairs per sheet,
//! no dependency information, no cached values, no entries for empty
//! cells. Implementations may block; the engine calls them synchronously
//! and assumes exclusive access to the sheet it manages.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use thiserror::Error;

/// Failure reported by a store implementation. The engine rolls back and
/// surfaces these as `DB` errors.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        StoreError(message.into())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Key/value persistence of formula text per sheet.
pub trait SheetStore {
    /// All persisted formulas for `sheet`, in a stable order.
    fn read_formulas(&mut self, sheet: &str) -> StoreResult<Vec<(String, String)>>;

    /// Insert or replace one cell's formula.
    fn update_cell(&mut self, sheet: &str, cell: &str, formula: &str) -> StoreResult<()>;

    /// Remove one cell's formula, if present.
    fn delete(&mut self, sheet: &str, cell: &str) -> StoreResult<()>;

    /// Remove every formula for `sheet`.
    fn clear(&mut self, sheet: &str) -> StoreResult<()>;

    /// Release underlying resources.
    fn close(&mut self) -> StoreResult<()>;
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemStore {
    sheets: FxHashMap<String, BTreeMap<String, String>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SheetStore for MemStore {
    fn read_formulas(&mut self, sheet: &str) -> StoreResult<Vec<(String, String)>> {
        Ok(self
            .sheets
            .get(sheet)
            .map(|cells| {
                cells
                    .iter()
                    .map(|(cell, formula)| (cell.clone(), formula.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn update_cell(&mut self, sheet: &str, cell: &str, formula: &str) -> StoreResult<()> {
        self.sheets
            .entry(sheet.to_string())
            .or_default()
            .insert(cell.to_string(), formula.to_string());
        Ok(())
    }

    fn delete(&mut self, sheet: &str, cell: &str) -> StoreResult<()> {
        if let Some(cells) = self.sheets.get_mut(sheet) {
            cells.remove(cell);
        }
        Ok(())
    }

    fn clear(&mut self, sheet: &str) -> StoreResult<()> {
        self.sheets.remove(sheet);
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        Ok(())
    }
}
