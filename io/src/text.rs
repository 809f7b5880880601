// ssengine-io/src/text.rs
//! Tab-separated plain-text dump, the one persistence format this crate
//! supports losslessly: it round-trips through `Sheet::set_cell`, unlike the
//! computed-values-only `PrintValues` format.

use std::io::{self, Write};

use formula::Position;
use log::debug;
use ssengine_core::{Sheet, SheetError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("row {0} has {1} columns, expected {2}")]
    RaggedRow(usize, usize, usize),
    #[error(transparent)]
    Sheet(#[from] SheetError),
    #[error(transparent)]
    Write(#[from] io::Error),
}

/// Render every materialized cell's text, tab-separated, one line per row —
/// the same format `Sheet::print_texts` produces, exposed here as the
/// crate's persistence boundary.
pub fn dump_texts(sheet: &Sheet) -> String {
    sheet.print_texts()
}

/// Parse a tab-separated text dump (as produced by [`dump_texts`]) into a
/// fresh `Sheet`. Every row must have the same column count.
pub fn load_texts(dump: &str) -> Result<Sheet, IoError> {
    let mut sheet = Sheet::new();
    let rows: Vec<&str> = dump.lines().collect();
    let expected_cols = rows.first().map(|r| r.split('\t').count()).unwrap_or(0);

    for (row_idx, row) in rows.iter().enumerate() {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() != expected_cols {
            return Err(IoError::RaggedRow(row_idx, cols.len(), expected_cols));
        }
        for (col_idx, text) in cols.iter().enumerate() {
            if text.is_empty() {
                continue;
            }
            let pos = Position::new(row_idx as u32, col_idx as u32);
            sheet.set_cell(pos, text)?;
        }
    }

    debug!("loaded sheet from text dump: {} row(s)", rows.len());
    Ok(sheet)
}

/// Write a dump to any `Write` sink (a file, stdout, ...).
pub fn write_texts<W: Write>(sheet: &Sheet, mut out: W) -> Result<(), IoError> {
    out.write_all(dump_texts(sheet).as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_set_cell() {
        let mut sheet = Sheet::new();
        sheet.set_cell(Position::new(0, 0), "1").unwrap();
        sheet.set_cell(Position::new(0, 1), "2").unwrap();
        sheet.set_cell(Position::new(1, 0), "=A1+B1").unwrap();

        let dump = dump_texts(&sheet);
        let reloaded = load_texts(&dump).unwrap();
        assert_eq!(reloaded.print_values(), sheet.print_values());
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = load_texts("1\t2\n3\n").unwrap_err();
        assert!(matches!(err, IoError::RaggedRow(1, 1, 2)));
    }
}
