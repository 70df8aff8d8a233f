use thiserror::Error;

/// Errors raised by layout database operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Cell '{0}' not found")]
    CellNotFound(String),

    #[error("Cell '{0}' already exists")]
    DuplicateCell(String),

    #[error("Cell '{0}' referenced but not defined")]
    UndefinedCell(String),

    #[error("Layout has no top cell")]
    NoTopCell,

    #[error("Layout has more than one top cell: {}", .0.join(", "))]
    AmbiguousTopCell(Vec<String>),
}
