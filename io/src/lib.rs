// ssengine-io/src/lib.rs
//! Rendering and loading a `Sheet` to/from its one supported persistence
//! format. XLSX/CSV, present as stubs in earlier revisions of this crate,
//! are out of scope — see DESIGN.md.

pub mod text;

pub use text::{dump_texts, load_texts, write_texts, IoError};
