// ssengine-core/src/cell.rs
//! A single grid slot: its content (empty / text / formula), its cached
//! numeric result when applicable, and its edges in the dependency graph.
//!
//! Edges are stored as sets of [`Position`] rather than references to other
//! `Cell`s — the `Sheet` is the sole owner of cells (see [`crate::sheet`]),
//! so back-references have to go through a stable, Sheet-wide identifier
//! instead of a language-level reference.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;

use formula::{Expr, FormulaError, Position};

use crate::sheet::Sheet;

/// The result of reading a cell's value: a number, a text string, or an
/// in-band formula error.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Error(FormulaError),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Error(e) => write!(f, "{e}"),
        }
    }
}

/// The three disjoint content variants a cell can hold.
#[derive(Debug, Clone)]
pub enum CellContent {
    Empty,
    Text(String),
    Formula {
        /// Canonical `=`-prefixed, pretty-printed text (§3: may differ from
        /// what the user typed).
        text: String,
        expr: Expr,
        /// `None` = unset. Reset on every edit to a transitive child;
        /// errors are never memoized (re-evaluated on every read so the
        /// graph gets a chance to recover).
        cache: RefCell<Option<f64>>,
    },
}

#[derive(Debug, Clone)]
pub struct Cell {
    pos: Position,
    pub(crate) content: CellContent,
    /// Cells whose formulas reference this one.
    pub(crate) parents: HashSet<Position>,
    /// Cells this cell's formula references (empty unless `Formula`).
    pub(crate) children: HashSet<Position>,
}

/// Strip exactly one leading escape character (`'`) if present.
fn strip_escape(s: &str) -> &str {
    s.strip_prefix('\'').unwrap_or(s)
}

impl Cell {
    pub(crate) fn empty(pos: Position) -> Self {
        Cell { pos, content: CellContent::Empty, parents: HashSet::new(), children: HashSet::new() }
    }

    pub fn position(&self) -> Position {
        self.pos
    }

    pub fn content(&self) -> &CellContent {
        &self.content
    }

    /// `true` if any other cell's formula references this position.
    pub fn is_referenced(&self) -> bool {
        !self.parents.is_empty()
    }

    /// The deduplicated, source-order list of positions this cell's formula
    /// references; empty for `Empty`/`Text`.
    pub fn get_referenced_cells(&self) -> Vec<Position> {
        match &self.content {
            CellContent::Formula { expr, .. } => expr.referenced_cells(),
            _ => Vec::new(),
        }
    }

    /// The original text for `Text` (escape retained), the canonical `=` +
    /// pretty-printed expression for `Formula`, or the empty string.
    pub fn get_text(&self) -> String {
        match &self.content {
            CellContent::Empty => String::new(),
            CellContent::Text(s) => s.clone(),
            CellContent::Formula { text, .. } => text.clone(),
        }
    }

    /// Read this cell's value, evaluating (and caching) a formula on demand.
    /// Needs `sheet` to resolve references; see the module doc for why this
    /// isn't a self-contained method.
    pub fn get_value(&self, sheet: &Sheet) -> CellValue {
        match &self.content {
            CellContent::Empty => CellValue::Number(0.0),
            CellContent::Text(s) => CellValue::Text(strip_escape(s).to_string()),
            CellContent::Formula { expr, cache, .. } => {
                if let Some(v) = *cache.borrow() {
                    return CellValue::Number(v);
                }
                let mut lookup = |pos: Position| sheet.resolve_numeric(pos);
                match expr.evaluate(&mut lookup) {
                    Ok(v) => {
                        *cache.borrow_mut() = Some(v);
                        CellValue::Number(v)
                    }
                    Err(e) => CellValue::Error(e),
                }
            }
        }
    }

    /// Reset this cell's cache to unset. No-op unless the content is
    /// `Formula`. Returns whether the cache actually changed (used by the
    /// invalidation cascade to short-circuit already-unset subtrees).
    pub(crate) fn invalidate_cache(&self) -> bool {
        match &self.content {
            CellContent::Formula { cache, .. } => {
                let mut c = cache.borrow_mut();
                if c.is_some() {
                    *c = None;
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cell_value_is_zero() {
        let cell = Cell::empty(Position::new(0, 0));
        assert_eq!(cell.get_text(), "");
        assert!(!cell.is_referenced());
    }

    #[test]
    fn strip_escape_removes_single_leading_quote() {
        assert_eq!(strip_escape("'123"), "123");
        assert_eq!(strip_escape("'"), "");
        assert_eq!(strip_escape("123"), "123");
        assert_eq!(strip_escape("''123"), "'123");
    }
}
