// ssengine-cli/src/main.rs
//! Command-line interface for ssengine: an interactive REPL over a
//! single in-memory sheet, and a one-shot `print` over a saved text dump.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use formula::Position;
use log::warn;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use ssengine_core::{CellValue, Sheet};
use ssengine_io::{load_texts, write_texts};

#[derive(Parser)]
#[command(name = "ssengine")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactively edit a sheet: `A1=1+2` sets a cell, `A1` prints its
    /// value, `:save <path>` dumps the sheet, `:quit` exits.
    Repl {
        /// Optional text dump to load before starting.
        #[arg(short, long)]
        load: Option<PathBuf>,
    },

    /// Load a text dump and print its values and texts grids.
    Print {
        /// Path to a tab-separated text dump.
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Repl { load } => run_repl(load),
        Commands::Print { input } => run_print(input),
    }
}

fn run_print(input: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let dump = std::fs::read_to_string(&input)?;
    let sheet = load_texts(&dump)?;
    println!("{}", sheet.print_values());
    println!("---");
    println!("{}", sheet.print_texts());
    Ok(())
}

fn run_repl(load: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let mut sheet = match load {
        Some(path) => {
            let dump = std::fs::read_to_string(&path)?;
            load_texts(&dump)?
        }
        None => Sheet::new(),
    };

    let mut rl = DefaultEditor::new()?;
    println!("ssengine repl. `A1=1+B2` to set, `A1` to read, `:save <path>`, `:quit`.");

    loop {
        match rl.readline("ssengine> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;

                if line == ":quit" {
                    break;
                }
                if let Some(path) = line.strip_prefix(":save ") {
                    if let Err(e) = save_sheet(&sheet, path.trim()) {
                        eprintln!("error saving: {e}");
                    }
                    continue;
                }

                handle_line(&mut sheet, line);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                warn!("readline error: {e}");
                break;
            }
        }
    }
    Ok(())
}

fn handle_line(sheet: &mut Sheet, line: &str) {
    let Some(eq_idx) = line.find('=') else {
        print_lookup(sheet, line);
        return;
    };
    let (addr, rest) = line.split_at(eq_idx);
    let Some(pos) = Position::from_a1(addr.trim()) else {
        eprintln!("invalid cell address {addr:?}");
        return;
    };
    match sheet.set_cell(pos, &rest[1..]) {
        Ok(()) => println!("{}", describe(sheet.get_value(pos))),
        Err(e) => eprintln!("error: {e}"),
    }
}

fn print_lookup(sheet: &Sheet, addr: &str) {
    let Some(pos) = Position::from_a1(addr.trim()) else {
        eprintln!("invalid cell address {addr:?}");
        return;
    };
    println!("{}", describe(sheet.get_value(pos)));
}

fn describe(value: Option<CellValue>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "<out of bounds>".to_string(),
    }
}

fn save_sheet(sheet: &Sheet, path: &str) -> std::io::Result<()> {
    let file = std::fs::File::create(path)?;
    write_texts(sheet, file).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}
