//! Formula AST.
//!
//! Closed sum types with exhaustive matching everywhere; no dynamic
//! dispatch. References carry per-axis absolute/relative state so the
//! printer can rebase a formula against any target cell.

use crate::cell_id::CellId;
use crate::coord::{MAX_COLS, MAX_ROWS};
use crate::error::{EngineError, Result};

/// One axis of a cell reference.
///
/// Absolute axes store the zero-based coordinate itself; relative axes
/// store an offset (possibly negative) from the cell that owns the AST.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Axis {
    pub is_abs: bool,
    pub index: i32,
}

impl Axis {
    pub fn absolute(index: i32) -> Self {
        Axis { is_abs: true, index }
    }

    pub fn relative(offset: i32) -> Self {
        Axis { is_abs: false, index: offset }
    }

    /// Absolute coordinate of this axis against `base`, bounds-checked.
    fn resolve(&self, base: i32, max: i32) -> Result<i32> {
        let abs = if self.is_abs { self.index } else { base + self.index };
        if (0..max).contains(&abs) {
            Ok(abs)
        } else {
            Err(EngineError::Syntax(format!(
                "reference resolves to index {abs}, outside 0..{max}"
            )))
        }
    }
}

/// A cell reference as stored in an AST.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRef {
    pub col: Axis,
    pub row: Axis,
}

impl CellRef {
    /// The absolute cell this reference names when the AST lives in
    /// `base`.
    pub fn resolve(&self, base: CellId) -> Result<CellId> {
        Ok(CellId::new(
            self.col.resolve(base.col, MAX_COLS)?,
            self.row.resolve(base.row, MAX_ROWS)?,
        ))
    }
}

/// Function identifiers.
///
/// `Neg` is its own variant so the printer never has to disambiguate a
/// one-armed subtraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FnId {
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    Min,
    Max,
}

impl FnId {
    /// Named (prefix) functions, looked up by the parser. Names are
    /// case-sensitive lowercase.
    pub fn from_name(name: &str) -> Option<FnId> {
        match name {
            "min" => Some(FnId::Min),
            "max" => Some(FnId::Max),
            _ => None,
        }
    }

    /// Symbol and binding strength for infix operators; `None` for
    /// `Neg`/`Min`/`Max`.
    pub fn infix(self) -> Option<(char, u8)> {
        match self {
            FnId::Add => Some(('+', 10)),
            FnId::Sub => Some(('-', 10)),
            FnId::Mul => Some(('*', 20)),
            FnId::Div => Some(('/', 20)),
            FnId::Neg | FnId::Min | FnId::Max => None,
        }
    }
}

/// Parsed form of a formula.
#[derive(Clone, Debug, PartialEq)]
pub enum Ast {
    /// Finite numeric literal.
    Num(f64),
    /// Reference leaf.
    Ref(CellRef),
    /// Function application. Arity: 1 for `Neg`, 2 for the arithmetic
    /// operators, 1 or more for `Min`/`Max`.
    App { op: FnId, args: Vec<Ast> },
}
