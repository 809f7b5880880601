// ssengine-core/src/sheet.rs
//! The cell graph: sparse storage plus the edit protocol that keeps parent/
//! child edges, cycle-freedom, and cached values consistent.
//!
//! `Sheet` owns every `Cell`; cross-cell operations (materializing a
//! reference's target, cycle-checking against another cell's live edges,
//! invalidating an ancestor chain) live here rather than on `Cell` itself,
//! because they all need simultaneous mutable access to more than one cell —
//! mirroring how the teacher's `Workbook::set_cell_value` drives the same
//! kind of cross-cutting edit from the workbook level rather than the cell.

use hashbrown::HashMap;
use std::collections::HashSet;

use formula::{FormulaError, Position};
use log::debug;

use crate::cell::{Cell, CellContent, CellValue};
use crate::error::SheetError;

#[derive(Debug, Default)]
pub struct Sheet {
    cells: HashMap<Position, Cell>,
}

impl Sheet {
    pub fn new() -> Self {
        Sheet { cells: HashMap::new() }
    }

    /// Set a cell's content from raw input text.
    ///
    /// - Text beginning with `=` is parsed as a formula.
    /// - Text beginning with a single `'` has that character stripped for
    ///   display/value purposes but is stored verbatim (§3's escape rule).
    /// - Anything else is stored as plain text.
    ///
    /// On any rejection (invalid position, parse failure, would-be cycle)
    /// the sheet is left exactly as it was before the call — no partial
    /// materialization of referenced cells, no dangling edges.
    pub fn set_cell(&mut self, pos: Position, text: &str) -> Result<(), SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition);
        }

        let content = if text.is_empty() {
            CellContent::Empty
        } else if text.len() > 1 && text.starts_with('=') {
            let expr = formula::parse(&text[1..])?;
            CellContent::Formula {
                text: format!("={}", expr.pretty_print()),
                expr,
                cache: std::cell::RefCell::new(None),
            }
        } else {
            CellContent::Text(text.to_string())
        };

        let new_children: HashSet<Position> = match &content {
            CellContent::Formula { expr, .. } => expr.referenced_cells().into_iter().collect(),
            _ => HashSet::new(),
        };

        if !new_children.is_empty() && self.would_create_cycle(pos, &new_children) {
            return Err(SheetError::CircularDependency);
        }

        self.commit_content(pos, content, new_children);
        Ok(())
    }

    /// The materialized cell at `pos`, or `None` if that position has never
    /// been set (directly or as a formula's referenced-cell target) and is
    /// therefore not stored at all. Never creates a slot as a side effect —
    /// distinct from [`Sheet::get_value`], which treats an unmaterialized
    /// position the same as a materialized `Empty` one.
    pub fn get_cell(&self, pos: Position) -> Option<&Cell> {
        if !pos.is_valid() {
            return None;
        }
        self.cells.get(&pos)
    }

    /// Read a cell's current value, materializing nothing: a never-set
    /// position behaves as `Empty` (numeric zero) without being stored.
    pub fn get_value(&self, pos: Position) -> Option<CellValue> {
        if !pos.is_valid() {
            return None;
        }
        Some(match self.get_cell(pos) {
            Some(cell) => cell.get_value(self),
            None => CellValue::Number(0.0),
        })
    }

    /// The cell's display text, or the empty string for a never-set
    /// position.
    pub fn get_text(&self, pos: Position) -> String {
        match self.cells.get(&pos) {
            Some(cell) => cell.get_text(),
            None => String::new(),
        }
    }

    /// The positions a cell's formula references, or an empty list for any
    /// non-formula (including never-set) position.
    pub fn get_referenced_cells(&self, pos: Position) -> Vec<Position> {
        match self.cells.get(&pos) {
            Some(cell) => cell.get_referenced_cells(),
            None => Vec::new(),
        }
    }

    /// Reset a cell to `Empty`. The slot is dropped from storage entirely
    /// unless other live formulas still reference it, in which case it's
    /// kept around (as `Empty`) so those formulas keep a materialized
    /// parent to invalidate through — §9's Open Question on reconciling
    /// "release the slot" with "referencing formulas still need a parent"
    /// resolved in favor of the latter.
    pub fn clear_cell(&mut self, pos: Position) {
        let Some(cell) = self.cells.get(&pos) else { return };
        let is_referenced = cell.is_referenced();
        let old_children: Vec<Position> = cell.get_referenced_cells();

        for child_pos in &old_children {
            if let Some(child) = self.cells.get_mut(child_pos) {
                child.parents.remove(&pos);
            }
        }

        self.invalidate_parents(pos);

        if is_referenced {
            let parents = self.cells.get(&pos).map(|c| c.parents.clone()).unwrap_or_default();
            let mut fresh = Cell::empty(pos);
            fresh.parents = parents;
            self.cells.insert(pos, fresh);
        } else {
            self.cells.remove(&pos);
        }
    }

    /// The smallest bounding box `(rows, cols)` covering every materialized
    /// cell, `(0, 0)` if the sheet is empty. A cell counts as soon as it has
    /// a slot, regardless of content (an `Empty` cell kept alive by
    /// `clear_cell` still counts, matching a raw "is this slot occupied"
    /// check rather than a content filter).
    pub fn get_printable_size(&self) -> (u32, u32) {
        let mut max_row = None;
        let mut max_col = None;
        for pos in self.cells.keys() {
            max_row = Some(max_row.map_or(pos.row, |m: u32| m.max(pos.row)));
            max_col = Some(max_col.map_or(pos.col, |m: u32| m.max(pos.col)));
        }
        match (max_row, max_col) {
            (Some(r), Some(c)) => (r + 1, c + 1),
            _ => (0, 0),
        }
    }

    /// Tab-separated grid of each cell's value, one line per row, no
    /// trailing tab, rows/columns beyond the printable size omitted.
    pub fn print_values(&self) -> String {
        self.print_grid(|sheet, pos| {
            sheet.get_value(pos).map(|v| v.to_string()).unwrap_or_default()
        })
    }

    /// Tab-separated grid of each cell's display text, same layout as
    /// [`Sheet::print_values`].
    pub fn print_texts(&self) -> String {
        self.print_grid(|sheet, pos| sheet.get_text(pos))
    }

    fn print_grid(&self, render: impl Fn(&Sheet, Position) -> String) -> String {
        let (rows, cols) = self.get_printable_size();
        let mut out = String::new();
        for row in 0..rows {
            for col in 0..cols {
                if col > 0 {
                    out.push('\t');
                }
                out.push_str(&render(self, Position::new(row, col)));
            }
            out.push('\n');
        }
        out
    }

    /// Resolve a reference during formula evaluation: an invalid position is
    /// a `#REF!` error, an unset cell is `0`, a text cell is parsed as a
    /// finite number or `#VALUE!`, and a formula cell recurses into its own
    /// (possibly cached) value.
    pub(crate) fn resolve_numeric(&self, pos: Position) -> Result<f64, FormulaError> {
        if !pos.is_valid() {
            return Err(FormulaError::Ref);
        }
        match self.cells.get(&pos) {
            None => Ok(0.0),
            Some(cell) => match cell.get_value(self) {
                CellValue::Number(n) => Ok(n),
                CellValue::Text(s) if s.is_empty() => Ok(0.0),
                CellValue::Text(s) => {
                    s.parse::<f64>().ok().filter(|n| n.is_finite()).ok_or(FormulaError::Value)
                }
                CellValue::Error(e) => Err(e),
            },
        }
    }

    /// Conservative pre-commit cycle check: would wiring `pos -> new_children`
    /// create a path back to `pos`? Runs a DFS from each proposed child,
    /// following live `children` edges, with a visited set so diamond-shaped
    /// graphs aren't re-walked exponentially. An unmaterialized position
    /// presents the same (empty) `children` set a freshly-inserted `Empty`
    /// cell would, so checking before materializing and checking after are
    /// equivalent — done here, before any mutation, so a rejected edit never
    /// leaves a partially-applied graph behind.
    fn would_create_cycle(&self, pos: Position, new_children: &HashSet<Position>) -> bool {
        let mut visited: HashSet<Position> = HashSet::new();
        let mut stack: Vec<Position> = new_children.iter().copied().collect();

        while let Some(current) = stack.pop() {
            if current == pos {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(cell) = self.cells.get(&current) {
                stack.extend(cell.children.iter().copied());
            }
        }
        false
    }

    /// Apply a content change that already passed the cycle check: rewire
    /// parent/child edges, materialize any newly-referenced cells as
    /// `Empty` slots, and invalidate every transitive parent's cache.
    fn commit_content(&mut self, pos: Position, content: CellContent, new_children: HashSet<Position>) {
        let old_children: HashSet<Position> = self
            .cells
            .get(&pos)
            .map(|c| c.children.clone())
            .unwrap_or_default();

        for removed in old_children.difference(&new_children) {
            if let Some(child) = self.cells.get_mut(removed) {
                child.parents.remove(&pos);
            }
        }
        for added in new_children.difference(&old_children) {
            self.cells.entry(*added).or_insert_with(|| Cell::empty(*added)).parents.insert(pos);
        }

        let cell = self.cells.entry(pos).or_insert_with(|| Cell::empty(pos));
        cell.content = content;
        cell.children = new_children;

        self.invalidate_parents(pos);
    }

    /// Invalidate the cached value of every cell transitively downstream of
    /// `pos` (i.e. every ancestor in the "depends on" sense). Stops
    /// descending through any cell whose cache was already unset, since a
    /// lazily-recomputed formula always reads its *current* children rather
    /// than a stale cache, so nothing past an already-clean cell can ever
    /// observe staleness this cascade skipped.
    fn invalidate_parents(&mut self, pos: Position) {
        let mut stack: Vec<Position> = self
            .cells
            .get(&pos)
            .map(|c| c.parents.iter().copied().collect())
            .unwrap_or_default();

        while let Some(current) = stack.pop() {
            let Some(cell) = self.cells.get(&current) else { continue };
            if !cell.invalidate_cache() {
                continue;
            }
            debug!("invalidated cache at {current}");
            stack.extend(cell.parents.iter().copied());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(a1: &str) -> Position {
        Position::from_a1(a1).unwrap()
    }

    fn value(sheet: &Sheet, a1: &str) -> CellValue {
        sheet.get_value(pos(a1)).unwrap()
    }

    #[test]
    fn plain_text_round_trips() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "hello").unwrap();
        assert_eq!(value(&sheet, "A1"), CellValue::Text("hello".into()));
        assert_eq!(sheet.get_text(pos("A1")), "hello");
    }

    #[test]
    fn escaped_leading_char_is_stripped_from_value_but_kept_in_text() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "'=1+2").unwrap();
        assert_eq!(value(&sheet, "A1"), CellValue::Text("=1+2".into()));
        assert_eq!(sheet.get_text(pos("A1")), "'=1+2");
    }

    #[test]
    fn formula_materializes_referenced_cell_as_empty() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "=B2+3").unwrap();
        assert_eq!(value(&sheet, "B2"), CellValue::Number(0.0));
        assert_eq!(value(&sheet, "A1"), CellValue::Number(3.0));
        assert_eq!(sheet.get_referenced_cells(pos("A1")), vec![pos("B2")]);
    }

    #[test]
    fn get_cell_distinguishes_untouched_from_materialized_empty() {
        let mut sheet = Sheet::new();
        assert!(sheet.get_cell(pos("B2")).is_none());

        sheet.set_cell(pos("A1"), "=B2+3").unwrap();
        let b2 = sheet.get_cell(pos("B2")).expect("B2 materialized by A1's formula");
        assert!(matches!(b2.content(), CellContent::Empty));
        assert!(b2.is_referenced());

        let a1 = sheet.get_cell(pos("A1")).unwrap();
        assert!(!a1.is_referenced());
    }

    #[test]
    fn empty_string_sets_cell_empty_and_bare_equals_is_plain_text() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "").unwrap();
        assert_eq!(value(&sheet, "A1"), CellValue::Number(0.0));
        assert!(matches!(sheet.get_cell(pos("A1")).unwrap().content(), CellContent::Empty));

        sheet.set_cell(pos("B1"), "=").unwrap();
        assert_eq!(value(&sheet, "B1"), CellValue::Text("=".into()));
        assert_eq!(sheet.get_text(pos("B1")), "=");
    }

    #[test]
    fn empty_text_cell_resolves_to_zero_in_formulas() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "'").unwrap();
        assert_eq!(value(&sheet, "A1"), CellValue::Text("".into()));

        sheet.set_cell(pos("B1"), "=A1+1").unwrap();
        assert_eq!(value(&sheet, "B1"), CellValue::Number(1.0));
    }

    #[test]
    fn value_propagates_and_cache_invalidates_on_edit() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("B1"), "10").unwrap();
        sheet.set_cell(pos("A1"), "=B1*2").unwrap();
        assert_eq!(value(&sheet, "A1"), CellValue::Number(20.0));

        sheet.set_cell(pos("B1"), "5").unwrap();
        assert_eq!(value(&sheet, "A1"), CellValue::Number(10.0));
    }

    #[test]
    fn direct_self_reference_is_rejected() {
        let mut sheet = Sheet::new();
        let err = sheet.set_cell(pos("A1"), "=A1+1").unwrap_err();
        assert_eq!(err, SheetError::CircularDependency);
        assert_eq!(value(&sheet, "A1"), CellValue::Number(0.0));
    }

    #[test]
    fn transitive_cycle_is_rejected_and_state_is_unchanged() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "=B1").unwrap();
        sheet.set_cell(pos("B1"), "=C1").unwrap();

        let err = sheet.set_cell(pos("C1"), "=A1").unwrap_err();
        assert_eq!(err, SheetError::CircularDependency);

        assert_eq!(sheet.get_text(pos("C1")), "");
        assert_eq!(value(&sheet, "A1"), CellValue::Number(0.0));
    }

    #[test]
    fn division_by_zero_and_text_value_errors_propagate() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "=1/0").unwrap();
        assert_eq!(value(&sheet, "A1"), CellValue::Error(FormulaError::Div0));

        sheet.set_cell(pos("B1"), "not a number").unwrap();
        sheet.set_cell(pos("A2"), "=B1+1").unwrap();
        assert_eq!(value(&sheet, "A2"), CellValue::Error(FormulaError::Value));
    }

    #[test]
    fn clear_cell_keeps_materialized_slot_alive_for_referencing_formulas() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("B2"), "10").unwrap();
        sheet.set_cell(pos("A1"), "=B2+1").unwrap();

        sheet.clear_cell(pos("B2"));
        assert_eq!(value(&sheet, "B2"), CellValue::Number(0.0));
        assert_eq!(value(&sheet, "A1"), CellValue::Number(1.0));
        let (rows, cols) = sheet.get_printable_size();
        assert!(rows >= 2 && cols >= 2);
    }

    #[test]
    fn clear_cell_releases_unreferenced_slot() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "hello").unwrap();
        sheet.clear_cell(pos("A1"));
        assert_eq!(sheet.get_printable_size(), (0, 0));
    }

    #[test]
    fn printable_grid_formats_with_tabs_and_newlines() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "1").unwrap();
        sheet.set_cell(pos("B1"), "2").unwrap();
        sheet.set_cell(pos("A2"), "3").unwrap();
        assert_eq!(sheet.print_texts(), "1\t2\n3\t\n");
    }

    #[test]
    fn invalid_position_is_rejected() {
        let mut sheet = Sheet::new();
        let bad = Position::new(formula::MAX_ROWS, 0);
        assert_eq!(sheet.set_cell(bad, "1"), Err(SheetError::InvalidPosition));
    }
}
