//! Merges the per-page tables of one crawl into the final holdings set.

use crate::models::{HoldingRow, HoldingsResult, PageTable, Symbol};
use std::collections::HashSet;
use tracing::debug;

/// Concatenate `tables` in page order and drop rows identical to an earlier
/// one. The first occurrence wins, so page order is preserved.
///
/// Two genuinely distinct positions that render identically in all five
/// columns collapse into one here.
pub fn assemble(symbol: Symbol, tables: Vec<PageTable>) -> HoldingsResult {
    let pages = tables.len();
    let total: usize = tables.iter().map(PageTable::len).sum();

    let mut seen: HashSet<HoldingRow> = HashSet::with_capacity(total);
    let rows: Vec<HoldingRow> = tables
        .into_iter()
        .flat_map(|t| t.rows)
        .filter(|row| seen.insert(row.clone()))
        .collect();

    let duplicates_removed = total - rows.len();
    if duplicates_removed > 0 {
        debug!("{}: dropped {} duplicate row(s)", symbol, duplicates_removed);
    }

    HoldingsResult {
        symbol,
        rows,
        pages,
        duplicates_removed,
    }
}
