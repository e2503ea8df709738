//! Symbol list loader: one ticker per line.

use crate::models::Symbol;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

/// Read symbols from `path`. Lines are trimmed and upper-cased; blank lines
/// are skipped. Order and duplicates are preserved for the caller to handle.
pub fn read_symbol_file(path: &Path) -> Result<Vec<Symbol>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read symbol file {:?}", path))?;

    let symbols = parse_symbol_lines(&text);
    info!("{} symbols read from {:?}", symbols.len(), path);
    Ok(symbols)
}

pub fn parse_symbol_lines(text: &str) -> Vec<Symbol> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let symbol = Symbol::parse(line);
            if symbol.is_none() {
                debug!("Skipping blank line {}", i + 1);
            }
            symbol
        })
        .collect()
}

/// Symbols given directly on the command line.
pub fn parse_symbol_args(args: &[String]) -> Vec<Symbol> {
    args.iter().filter_map(|s| Symbol::parse(s)).collect()
}
