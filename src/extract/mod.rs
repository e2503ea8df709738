//! Markup parsing for the rendered holdings page.
//!
//! Everything here is a pure function of an HTML string, so the crawler can
//! re-run it against every poll of the live page. The holdings table is found
//! by its header text rather than its position because the first render and
//! the paginated re-renders do not share the same layout.

pub mod cleaner;

use crate::config::SiteConfig;
use crate::models::{FundHeader, HoldingRow, PageSummary, PageTable};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use self::cleaner::{clean_cell, normalise_header, parse_count, parse_integers};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no table with a '{0}' header column")]
    NoMatchingTable(String),

    #[error("holdings table is missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),

    #[error("holdings table has no rows")]
    EmptyTable,

    #[error("invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },
}

// ── Compiled selectors ────────────────────────────────────────────────────────

/// CSS selectors from [`SiteConfig`], parsed once per run.
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    pub table_marker: String,
    pub page_size: Selector,
    pub summary: Selector,
    pub fund_name: Selector,
    pub last_price: Selector,
}

impl SiteSelectors {
    /// The next-page selector is only handed to the browser, but it is still
    /// checked here so a typo fails at startup.
    pub fn compile(site: &SiteConfig) -> Result<Self, ExtractError> {
        parse_selector(&site.next_page_selector)?;
        Ok(Self {
            table_marker: site.table_marker.clone(),
            page_size: parse_selector(&site.page_size_selector)?,
            summary: parse_selector(&site.summary_selector)?,
            fund_name: parse_selector(&site.fund_name_selector)?,
            last_price: parse_selector(&site.last_price_selector)?,
        })
    }
}

pub fn parse_selector(s: &str) -> Result<Selector, ExtractError> {
    Selector::parse(s).map_err(|e| ExtractError::Selector {
        selector: s.to_string(),
        reason: e.to_string(),
    })
}

/// Static selectors that cannot fail to parse.
fn sel(s: &'static str) -> Selector {
    match Selector::parse(s) {
        Ok(sel) => sel,
        Err(e) => unreachable!("static selector {s:?} is invalid: {e}"),
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    clean_cell(&el.text().collect::<String>())
}

// ── Holdings table ────────────────────────────────────────────────────────────

/// Output columns and the header spellings that map onto them.
const COLUMNS: [(&str, &[&str]); 5] = [
    ("Symbol", &["symbol", "ticker"]),
    ("Description", &["description", "name", "security name", "holding"]),
    ("Portfolio Weight", &["portfolio weight", "weight", "of assets"]),
    ("Shares Held", &["shares held", "shares", "quantity"]),
    ("Market Value", &["market value", "value"]),
];

/// Locate the holdings table in `markup` and normalise it into [`PageTable`].
///
/// The table is the first one with a header cell equal to `marker`
/// (case-insensitive). Columns are matched by header name; when that fails on
/// a five-column table they are taken in display order.
pub fn extract_holdings(markup: &str, marker: &str) -> Result<PageTable, ExtractError> {
    let doc = Html::parse_document(markup);
    let marker_norm = normalise_header(marker);

    let table_sel = sel("table");
    let Some((table, headers)) = doc.select(&table_sel).find_map(|table| {
        let headers = header_cells(table);
        headers.iter().any(|h| *h == marker_norm).then_some((table, headers))
    }) else {
        return Err(ExtractError::NoMatchingTable(marker.to_string()));
    };

    let columns = resolve_columns(&headers)?;

    let tr_sel = sel("tbody tr");
    let td_sel = sel("td");
    let mut rows = Vec::new();

    for tr in table.select(&tr_sel) {
        let cells: Vec<String> = tr.select(&td_sel).map(element_text).collect();
        if cells.is_empty() || cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        let cell = |i: usize| cells.get(columns[i]).cloned().unwrap_or_default();
        rows.push(HoldingRow {
            symbol: cell(0),
            description: cell(1),
            weight: cell(2),
            shares: cell(3),
            market_value: cell(4),
        });
    }

    if rows.is_empty() {
        return Err(ExtractError::EmptyTable);
    }
    Ok(PageTable::new(rows))
}

/// Normalised header texts: the `thead` row if present, else the first row
/// that has `th` cells.
fn header_cells(table: ElementRef<'_>) -> Vec<String> {
    let thead_sel = sel("thead tr");
    let cell_sel = sel("th, td");
    let th_sel = sel("th");
    let tr_sel = sel("tr");

    let header_row = table
        .select(&thead_sel)
        .next()
        .or_else(|| table.select(&tr_sel).find(|tr| tr.select(&th_sel).next().is_some()));

    header_row
        .map(|tr| tr.select(&cell_sel).map(|c| normalise_header(&element_text(c))).collect())
        .unwrap_or_default()
}

/// Column index for each entry of [`COLUMNS`].
fn resolve_columns(headers: &[String]) -> Result<[usize; 5], ExtractError> {
    let mut resolved: [Option<usize>; 5] = [None; 5];

    // Exact spellings first so "value" cannot claim "market value" early
    for exact in [true, false] {
        for (field, (_, aliases)) in COLUMNS.iter().enumerate() {
            if resolved[field].is_some() {
                continue;
            }
            let hit = headers.iter().enumerate().find(|(i, h)| {
                !resolved.contains(&Some(*i))
                    && aliases
                        .iter()
                        .any(|a| if exact { h.as_str() == *a } else { h.contains(a) })
            });
            resolved[field] = hit.map(|(i, _)| i);
        }
    }

    if resolved.iter().all(Option::is_some) {
        return Ok(resolved.map(|i| i.unwrap_or_default()));
    }
    if headers.len() == COLUMNS.len() {
        return Ok([0, 1, 2, 3, 4]);
    }

    let missing = COLUMNS
        .iter()
        .zip(resolved)
        .filter(|(_, idx)| idx.is_none())
        .map(|((name, _), _)| *name)
        .collect();
    Err(ExtractError::MissingColumns(missing))
}

// ── Pagination controls ───────────────────────────────────────────────────────

/// A page-size choice and its position among the matched elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSizeOption {
    pub index: usize,
    pub size: u32,
}

pub fn has_element(markup: &str, selector: &Selector) -> bool {
    Html::parse_document(markup).select(selector).next().is_some()
}

/// All page-size options with a numeric label. Non-numeric ones ("All") are
/// skipped but still count towards `index`.
pub fn parse_page_sizes(markup: &str, selector: &Selector) -> Vec<PageSizeOption> {
    let doc = Html::parse_document(markup);
    doc.select(selector)
        .enumerate()
        .filter_map(|(index, el)| {
            parse_count(&element_text(el)).map(|size| PageSizeOption { index, size })
        })
        .collect()
}

pub fn largest_page_size(options: &[PageSizeOption]) -> Option<PageSizeOption> {
    options.iter().copied().max_by_key(|o| o.size)
}

/// Read "Showing 1 - 60 of 500" style text. The last three integers are taken,
/// so a leading label with its own number does not confuse it.
pub fn parse_page_summary(markup: &str, selector: &Selector) -> Option<PageSummary> {
    let doc = Html::parse_document(markup);
    let text = element_text(doc.select(selector).next()?);
    match parse_integers(&text).as_slice() {
        [.., first, last, total] if first <= last && last <= total => Some(PageSummary {
            first: *first,
            last: *last,
            total: *total,
        }),
        _ => None,
    }
}

// ── Fund header ───────────────────────────────────────────────────────────────

pub fn parse_fund_header(markup: &str, selectors: &SiteSelectors) -> FundHeader {
    let doc = Html::parse_document(markup);
    let text_of = |s: &Selector| {
        doc.select(s)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
    };
    FundHeader {
        name: text_of(&selectors.fund_name),
        last_price: text_of(&selectors.last_price),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
