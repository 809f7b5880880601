use thiserror::Error;

/// An in-band error value a formula can evaluate to. Produced by evaluation,
/// never thrown across the parse boundary.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormulaError {
    #[error("#DIV/0!")]
    Div0,
    #[error("#VALUE!")]
    Value,
    #[error("#REF!")]
    Ref,
}

/// The parser rejected the text outright; the caller's cell is left
/// unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("formula syntax error: {0}")]
pub struct ParseError(pub String);
