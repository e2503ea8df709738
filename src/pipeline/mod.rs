//! Batch orchestrator: crawls each requested fund in turn.
//!
//! ## Behaviour
//!
//! - Symbols are processed strictly in the order given, one rendering session
//!   at a time.
//! - A symbol seen earlier in the same batch is skipped.
//! - Per-symbol failures (unknown symbol, render error, pagination timeout,
//!   extraction error) are recorded and the batch moves on.
//! - Only a failure to launch a rendering session at all stops the batch.
//!   Symbols finished before it are still returned, with the error kept in
//!   [`BatchReport::aborted`].
//!
//! All results come back in a [`BatchReport`]; nothing is written here.

use crate::assembler::assemble;
use crate::config::AppConfig;
use crate::crawler::{CrawlError, PaginationDriver};
use crate::models::{HoldingsResult, LogEntry, Symbol, SymbolOutcome};
use crate::session::SessionLauncher;
use anyhow::{Context, Result};
use std::collections::HashSet;
use tracing::{Instrument, error, info, info_span, warn};

pub struct Pipeline {
    driver: PaginationDriver,
    launcher: Box<dyn SessionLauncher>,
    collect_log: bool,
}

/// Outcome of a whole batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<HoldingsResult>,
    pub log_entries: Vec<LogEntry>,
    pub outcomes: Vec<SymbolOutcome>,
    /// Set when a session launch failed and the remaining symbols were not tried.
    pub aborted: Option<CrawlError>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.len()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }
}

impl Pipeline {
    pub fn new(config: &AppConfig, launcher: Box<dyn SessionLauncher>, collect_log: bool) -> Result<Self> {
        Ok(Self {
            driver: PaginationDriver::new(config).context("Invalid site selectors")?,
            launcher,
            collect_log,
        })
    }

    pub async fn run(&self, symbols: &[Symbol]) -> BatchReport {
        let mut report = BatchReport::default();
        let mut attempted: HashSet<&Symbol> = HashSet::new();

        for symbol in symbols {
            if !attempted.insert(symbol) {
                info!("{}: already processed in this run, skipping", symbol);
                continue;
            }

            let crawled = self
                .driver
                .crawl(self.launcher.as_ref(), symbol)
                .instrument(info_span!("crawl", %symbol))
                .await;

            match crawled {
                Ok(output) => {
                    let result = assemble(symbol.clone(), output.tables);
                    info!(
                        "{}: {} holdings from {} page(s)",
                        symbol,
                        result.row_count(),
                        result.pages
                    );
                    if self.collect_log {
                        report.log_entries.push(LogEntry::new(&result, &output.header));
                    }
                    report.outcomes.push(SymbolOutcome {
                        symbol: symbol.clone(),
                        success: true,
                        rows: result.row_count(),
                        reason: None,
                    });
                    report.results.push(result);
                }
                Err(e) if e.is_fatal() => {
                    error!("{}: {}; aborting batch", symbol, e);
                    report.aborted = Some(e);
                    break;
                }
                Err(e) => {
                    warn!(kind = e.kind(), "{}: {} - holdings file not generated", symbol, e);
                    report.outcomes.push(SymbolOutcome {
                        symbol: symbol.clone(),
                        success: false,
                        rows: 0,
                        reason: Some(e.to_string()),
                    });
                }
            }
        }

        info!(
            "=== Done: {} succeeded | {} failed | {} not processed ===",
            report.succeeded(),
            report.failed(),
            symbols.len() - report.outcomes.len()
        );
        report
    }
}
