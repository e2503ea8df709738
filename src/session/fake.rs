//! Scripted stand-in for a browser, serving a paginated holdings page from
//! memory. Clicks swap content only after a configurable number of stale reads,
//! which is how the real site behaves while its XHR is in flight.

use super::{RenderSession, SessionError, SessionLauncher};
use crate::config::{AppConfig, SiteConfig};
use crate::models::HoldingRow;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const URL_TEMPLATE: &str = "fake://etf/{symbol}";

/// Defaults pointed at the fake site, with waits shrunk to milliseconds.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.site.url_template = URL_TEMPLATE.to_string();
    config.crawler.max_load_wait_secs = 0;
    config.crawler.poll_interval_ms = 1;
    config.crawler.poll_max_attempts = 10;
    config
}

#[derive(Debug, Clone)]
pub struct FakeSite {
    pub name: String,
    pub price: String,
    pub rows: Vec<HoldingRow>,
    pub page_sizes: Vec<u32>,
    pub initial_size: u32,
    /// Reads that still return the old page after each click.
    pub stale_reads: usize,
    /// The "next" control is clickable but the content never moves.
    pub frozen: bool,
    /// Rows from the end of the previous page repeated at the top of the next.
    pub overlap: usize,
    /// The holdings table has no "Symbol" header.
    pub no_table: bool,
    /// The pagination summary is never rendered.
    pub no_summary: bool,
    /// The "next" control vanishes once this page is reached.
    pub drop_next_after: Option<usize>,
}

impl FakeSite {
    pub fn with_holdings(name: &str, count: usize) -> Self {
        let rows = (0..count)
            .map(|i| HoldingRow {
                symbol: format!("H{:04}", i),
                description: format!("Holding {} Corp", i),
                weight: format!("{:.2}%", 100.0 / count as f64),
                shares: format!("{}", 1_000 + i),
                market_value: format!("${}.00", 10_000 + i),
            })
            .collect();
        Self {
            name: name.to_string(),
            price: "101.25".to_string(),
            rows,
            page_sizes: vec![20, 60],
            initial_size: 20,
            stale_reads: 2,
            frozen: false,
            overlap: 0,
            no_table: false,
            no_summary: false,
            drop_next_after: None,
        }
    }

    fn page_count(&self, size: u32) -> usize {
        self.rows.len().div_ceil(size as usize).max(1)
    }

    fn has_next(&self, page: usize, size: u32) -> bool {
        page < self.page_count(size) && self.drop_next_after.is_none_or(|last| page < last)
    }
}

#[derive(Debug, Default)]
pub struct FakeStats {
    pub launched: AtomicUsize,
    pub closed: AtomicUsize,
    pub next_clicks: AtomicUsize,
    pub navigations: Mutex<Vec<String>>,
}

impl FakeStats {
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
    pub fn next_clicks(&self) -> usize {
        self.next_clicks.load(Ordering::SeqCst)
    }
    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct FakeLauncher {
    sites: Arc<HashMap<String, FakeSite>>,
    unreachable: HashSet<String>,
    fail_launch: bool,
    /// Launches that succeed before every further one fails.
    launch_budget: Option<usize>,
    pub stats: Arc<FakeStats>,
}

impl FakeLauncher {
    pub fn new(sites: impl IntoIterator<Item = (&'static str, FakeSite)>) -> Self {
        Self {
            sites: Arc::new(sites.into_iter().map(|(s, site)| (s.to_string(), site)).collect()),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self { fail_launch: true, ..Self::default() }
    }

    pub fn fail_launch_after(mut self, launches: usize) -> Self {
        self.launch_budget = Some(launches);
        self
    }

    pub fn unreachable(mut self, symbol: &str) -> Self {
        self.unreachable.insert(symbol.to_string());
        self
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn RenderSession>, SessionError> {
        let exhausted = self.launch_budget.is_some_and(|n| self.stats.launched() >= n);
        if self.fail_launch || exhausted {
            return Err(SessionError::Launch("no browser binary".into()));
        }
        self.stats.launched.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            sites: Arc::clone(&self.sites),
            unreachable: self.unreachable.clone(),
            stats: Arc::clone(&self.stats),
            state: Mutex::new(State::default()),
        }))
    }
}

#[derive(Default)]
struct State {
    site: Option<FakeSite>,
    symbol: String,
    size: u32,
    page: usize,
    stale: Option<(String, usize)>,
    closed: bool,
}

pub struct FakeSession {
    sites: Arc<HashMap<String, FakeSite>>,
    unreachable: HashSet<String>,
    stats: Arc<FakeStats>,
    state: Mutex<State>,
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        self.stats.navigations.lock().unwrap().push(url.to_string());
        let symbol = url.rsplit('/').next().unwrap_or_default().to_string();
        if self.unreachable.contains(&symbol) {
            return Err(SessionError::Navigation(format!("dns error for {}", url)));
        }

        let mut state = self.state.lock().unwrap();
        state.site = self.sites.get(&symbol).cloned();
        state.size = state.site.as_ref().map(|s| s.initial_size).unwrap_or_default();
        state.page = 1;
        state.symbol = symbol;
        state.stale = None;
        Ok(())
    }

    async fn markup(&self) -> Result<String, SessionError> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(SessionError::Driver("session closed".into()));
        }
        if let Some((html, remaining)) = state.stale.as_mut() {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(html.clone());
            }
        }
        state.stale = None;
        Ok(render(&state))
    }

    async fn click(&self, selector: &str, index: usize) -> Result<bool, SessionError> {
        let selectors = SiteConfig::default();
        let mut state = self.state.lock().unwrap();
        let Some(site) = state.site.clone() else { return Ok(false) };
        let before = render(&state);

        if selector == selectors.page_size_selector {
            let Some(size) = site.page_sizes.get(index).copied() else { return Ok(false) };
            state.size = size;
            state.page = 1;
        } else if selector == selectors.next_page_selector {
            if !site.has_next(state.page, state.size) {
                return Ok(false);
            }
            self.stats.next_clicks.fetch_add(1, Ordering::SeqCst);
            if site.frozen {
                return Ok(true);
            }
            state.page += 1;
        } else {
            return Ok(false);
        }

        state.stale = Some((before, site.stale_reads));
        Ok(true)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        if !state.closed {
            state.closed = true;
            self.stats.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn render(state: &State) -> String {
    let Some(site) = &state.site else {
        return format!(
            "<html><body><p>There are no results for {}.</p></body></html>",
            escape(&state.symbol)
        );
    };

    let size = state.size as usize;
    let total = site.rows.len();
    let start = (state.page - 1) * size;
    let end = (start + size).min(total);
    let from = if state.page > 1 { start.saturating_sub(site.overlap) } else { start };

    let sizes: String = site
        .page_sizes
        .iter()
        .map(|s| format!("<li><a href=\"#\">{}</a></li>", s))
        .collect();
    let next = if site.has_next(state.page, state.size) {
        "<li class=\"next\"><a href=\"#\">Next</a></li>"
    } else {
        ""
    };
    let body: String = site.rows[from..end]
        .iter()
        .map(|r| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(&r.symbol),
                escape(&r.description),
                escape(&r.weight),
                escape(&r.shares),
                escape(&r.market_value)
            )
        })
        .collect();

    let summary = if site.no_summary {
        String::new()
    } else {
        format!(
            "<div class=\"paginationSummary\">Showing {} - {} of {}</div>",
            start + 1,
            end,
            total
        )
    };
    let first_header = if site.no_table { "Ticker" } else { "Symbol" };

    format!(
        r#"<html><body>
        <div id="modFirstHeader"><span class="fundName">{name}</span><span class="lastPrice">{price}</span></div>
        <div id="PaginationContainer">
            <ul class="pageSize">{sizes}</ul>
            {summary}
            <ul class="pages">{next}</ul>
        </div>
        <table>
            <thead><tr><th>{first_header}</th><th>Description</th><th>Portfolio Weight</th><th>Shares Held</th><th>Market Value</th></tr></thead>
            <tbody>{body}</tbody>
        </table>
        </body></html>"#,
        name = escape(&site.name),
        price = escape(&site.price),
    )
}
