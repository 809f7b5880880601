// ssengine-core/src/error.rs
use formula::ParseError;
use thiserror::Error;

/// Failure categories for [`crate::Sheet`] operations. These reject the
/// operation outright and leave the sheet's state unchanged; they are
/// distinct from [`formula::FormulaError`], which is an in-band value
/// returned from a successful `get_value`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SheetError {
    #[error("position out of bounds")]
    InvalidPosition,

    #[error("formula would introduce a circular reference")]
    CircularDependency,

    #[error("formula syntax error: {0}")]
    Formula(#[from] ParseError),
}
