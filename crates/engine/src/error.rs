//! Error types for the celltab engine.

use thiserror::Error;

use crate::cell_id::CellId;

/// Errors surfaced by the engine's public operations.
///
/// The short codes (`SYNTAX`, `CIRCULAR_REF`, `LIMITS`, `DB`) are part of
/// the user-visible contract and prefix every rendered message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Malformed formula, malformed cell reference, or an out-of-range
    /// coordinate produced while parsing or printing.
    #[error("SYNTAX: {0}")]
    Syntax(String),

    /// A cycle was found during forward evaluation. Names one cell on the
    /// cycle.
    #[error("CIRCULAR_REF: circular reference through {0}")]
    CircularRef(CellId),

    /// Row or column index outside the configured maxima.
    #[error("LIMITS: {0}")]
    Limits(String),

    /// Failure reported by the persistence collaborator.
    #[error("DB: {0}")]
    Db(String),
}

impl EngineError {
    /// Stable user-visible code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Syntax(_) => "SYNTAX",
            EngineError::CircularRef(_) => "CIRCULAR_REF",
            EngineError::Limits(_) => "LIMITS",
            EngineError::Db(_) => "DB",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
