use serde::{Deserialize, Serialize};
use std::fmt;

use crate::extract::cleaner::normalise_symbol;

// ── Symbol ────────────────────────────────────────────────────────────────────

/// Fund ticker, trimmed and upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Returns `None` for blank input.
    pub fn parse(s: &str) -> Option<Self> {
        let s = normalise_symbol(s);
        if s.is_empty() { None } else { Some(Self(s)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

// ── Holdings ──────────────────────────────────────────────────────────────────

/// One constituent position as displayed on the holdings page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HoldingRow {
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Portfolio Weight")]
    pub weight: String,
    #[serde(rename = "Shares Held")]
    pub shares: String,
    #[serde(rename = "Market Value")]
    pub market_value: String,
}

/// Rows extracted from a single rendered page, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageTable {
    pub rows: Vec<HoldingRow>,
}

impl PageTable {
    pub fn new(rows: Vec<HoldingRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Final, deduplicated holdings for one fund. Only built for successful crawls,
/// so it has no success flag; failures show up as a [`SymbolOutcome`] alone.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingsResult {
    pub symbol: Symbol,
    pub rows: Vec<HoldingRow>,
    pub pages: usize,
    pub duplicates_removed: usize,
}

impl HoldingsResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

// ── Fund metadata ─────────────────────────────────────────────────────────────

/// Header region of the holdings page. Either field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FundHeader {
    pub name: Option<String>,
    pub last_price: Option<String>,
}

/// One row of `etf-log.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    #[serde(rename = "Symbol")]
    pub symbol: Symbol,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Last Price")]
    pub last_price: String,
    #[serde(rename = "Number of Holdings")]
    pub holdings: usize,
}

impl LogEntry {
    pub fn new(result: &HoldingsResult, header: &FundHeader) -> Self {
        Self {
            symbol: result.symbol.clone(),
            name: header.name.clone().unwrap_or_default(),
            last_price: header.last_price.clone().unwrap_or_default(),
            holdings: result.row_count(),
        }
    }
}

// ── Pagination ────────────────────────────────────────────────────────────────

/// "Showing 1 - 60 of 500" → first = 1, last = 60, total = 500
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSummary {
    pub first: u32,
    pub last: u32,
    pub total: u32,
}

impl PageSummary {
    /// Number of rows the page claims to show.
    pub fn shown(&self) -> u32 {
        self.last.saturating_sub(self.first) + 1
    }

    /// `ceil(total / page_size)`, never less than one page.
    pub fn page_count(&self, page_size: u32) -> u32 {
        if page_size == 0 {
            return 1;
        }
        self.total.div_ceil(page_size).max(1)
    }
}

// ── Reporting ─────────────────────────────────────────────────────────────────

/// What happened to one requested symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolOutcome {
    pub symbol: Symbol,
    pub success: bool,
    pub rows: usize,
    pub reason: Option<String>,
}
