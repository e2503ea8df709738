//! Pagination driver: walks one fund's holdings listing page by page.
//!
//! Per symbol the crawl goes
//! `Opening → LocatingPagination → LoadingPage(1) → Advancing(n)/LoadingPage(n) → done`.
//! A fresh rendering session is launched for each symbol and closed once the
//! crawl body returns, whatever it returned.

pub mod change;
pub mod error;
pub mod poll;

use crate::config::{AppConfig, SiteConfig};
use crate::extract::{
    ExtractError, SiteSelectors, extract_holdings, has_element, largest_page_size,
    parse_fund_header, parse_page_sizes, parse_page_summary,
};
use crate::models::{FundHeader, PageSummary, PageTable, Symbol};
use crate::session::{RenderSession, SessionLauncher};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};
use url::{Url, form_urlencoded};

pub use self::error::{CrawlError, Stage};
use self::change::wait_for_change;
use self::poll::{PollError, PollPolicy, poll_until};

/// Everything scraped for one symbol before assembly.
#[derive(Debug, Clone)]
pub struct CrawlOutput {
    pub tables: Vec<PageTable>,
    pub header: FundHeader,
}

pub struct PaginationDriver {
    site: SiteConfig,
    selectors: SiteSelectors,
    load_wait: Duration,
    poll: PollPolicy,
}

impl PaginationDriver {
    pub fn new(config: &AppConfig) -> Result<Self, ExtractError> {
        Ok(Self {
            site: config.site.clone(),
            selectors: SiteSelectors::compile(&config.site)?,
            load_wait: config.crawler.max_load_wait(),
            poll: PollPolicy::from_config(&config.crawler),
        })
    }

    /// Holdings page for `symbol`, from the configured template. The symbol is
    /// percent-encoded so it cannot add query parameters or a fragment.
    pub fn holdings_url(&self, symbol: &Symbol) -> Result<Url, CrawlError> {
        let encoded: String = form_urlencoded::byte_serialize(symbol.as_str().as_bytes()).collect();
        let raw = self.site.url_template.replace("{symbol}", &encoded);
        Url::parse(&raw).map_err(|e| CrawlError::render(Stage::Opening, format!("bad URL {}: {}", raw, e)))
    }

    /// Crawl every page of `symbol`'s holdings in its own session.
    pub async fn crawl(
        &self,
        launcher: &dyn SessionLauncher,
        symbol: &Symbol,
    ) -> Result<CrawlOutput, CrawlError> {
        let url = self.holdings_url(symbol)?;

        let mut session = launcher
            .launch()
            .await
            .map_err(|e| CrawlError::SessionLaunch(e.to_string()))?;

        let outcome = self.drive(session.as_ref(), url.as_str()).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close rendering session: {}", e);
        }
        outcome
    }

    async fn drive(&self, session: &dyn RenderSession, url: &str) -> Result<CrawlOutput, CrawlError> {
        debug!("Opening {}", url);
        session
            .navigate(url)
            .await
            .map_err(|e| CrawlError::render(Stage::Opening, e))?;

        let markup = self.wait_for_pagination(session).await?;
        let header = parse_fund_header(&markup, &self.selectors);

        let page_size = self.switch_to_largest_page_size(session, &markup).await?;
        let pages = match self.settle_page_size(session, page_size).await? {
            Some(summary) => {
                let size = page_size.unwrap_or_else(|| summary.shown());
                let pages = summary.page_count(size);
                info!("{} holdings listed, page size {}, {} page(s)", summary.total, size, pages);
                pages
            }
            None => 1,
        };

        let mut current = self.extract_page(session, 1).await?;
        debug!("Page 1/{}: {} rows", pages, current.len());

        let mut tables = Vec::with_capacity(pages as usize);
        for page in 2..=pages {
            self.advance(session, page).await?;

            let next = wait_for_change(session, &current, &self.selectors.table_marker, &self.poll)
                .await
                .map_err(|e| match e {
                    PollError::Pending => CrawlError::PaginationTimeout {
                        page,
                        attempts: self.poll.max_attempts,
                    },
                    PollError::Session(e) => CrawlError::render(Stage::LoadingPage(page), e),
                })?;

            debug!("Page {}/{}: {} rows", page, pages, next.len());
            tables.push(std::mem::replace(&mut current, next));
        }
        tables.push(current);

        Ok(CrawlOutput { tables, header })
    }

    /// Wait for the page-size control to render. Its absence after the load
    /// wait means the site has no holdings page for this symbol.
    async fn wait_for_pagination(&self, session: &dyn RenderSession) -> Result<String, CrawlError> {
        let deadline = Instant::now() + self.load_wait;
        loop {
            let markup = session
                .markup()
                .await
                .map_err(|e| CrawlError::render(Stage::LocatingPagination, e))?;

            if has_element(&markup, &self.selectors.page_size) {
                return Ok(markup);
            }
            if Instant::now() >= deadline {
                return Err(CrawlError::SymbolNotFound {
                    waited_secs: self.load_wait.as_secs(),
                });
            }
            sleep(self.poll.interval).await;
        }
    }

    /// Click the largest numeric page size. `None` when no option is numeric,
    /// in which case the current size is kept.
    async fn switch_to_largest_page_size(
        &self,
        session: &dyn RenderSession,
        markup: &str,
    ) -> Result<Option<u32>, CrawlError> {
        let options = parse_page_sizes(markup, &self.selectors.page_size);
        let Some(largest) = largest_page_size(&options) else {
            warn!("Page-size control has no numeric options; keeping current size");
            return Ok(None);
        };

        debug!("Switching page size to {}", largest.size);
        let clicked = session
            .click(&self.site.page_size_selector, largest.index)
            .await
            .map_err(|e| CrawlError::render(Stage::LocatingPagination, e))?;
        if !clicked {
            return Err(CrawlError::render(
                Stage::LocatingPagination,
                "page-size option disappeared before it could be clicked",
            ));
        }
        Ok(Some(largest.size))
    }

    /// Poll the pagination summary until it shows a full first page at the new
    /// size. A listing without any summary is a single page.
    async fn settle_page_size(
        &self,
        session: &dyn RenderSession,
        page_size: Option<u32>,
    ) -> Result<Option<PageSummary>, CrawlError> {
        let summary_sel = &self.selectors.summary;

        let settled = poll_until(&self.poll, move || async move {
            let markup = session.markup().await?;
            match parse_page_summary(&markup, summary_sel) {
                Some(s) if s.total == 0 || page_size.is_none_or(|p| s.shown() == p.min(s.total)) => {
                    Ok(s)
                }
                _ => Err(PollError::Pending),
            }
        })
        .await;

        match settled {
            Ok(summary) => Ok(Some(summary)),
            Err(PollError::Session(e)) => Err(CrawlError::render(Stage::LoadingPage(1), e)),
            Err(PollError::Pending) => {
                let markup = session
                    .markup()
                    .await
                    .map_err(|e| CrawlError::render(Stage::LoadingPage(1), e))?;
                if parse_page_summary(&markup, summary_sel).is_some() {
                    return Err(CrawlError::PaginationTimeout {
                        page: 1,
                        attempts: self.poll.max_attempts,
                    });
                }
                warn!("No pagination summary found; treating listing as a single page");
                Ok(None)
            }
        }
    }

    async fn extract_page(&self, session: &dyn RenderSession, page: u32) -> Result<PageTable, CrawlError> {
        let markup = session
            .markup()
            .await
            .map_err(|e| CrawlError::render(Stage::LoadingPage(page), e))?;
        extract_holdings(&markup, &self.selectors.table_marker)
            .map_err(|source| CrawlError::Extraction { page, source })
    }

    async fn advance(&self, session: &dyn RenderSession, page: u32) -> Result<(), CrawlError> {
        let clicked = session
            .click(&self.site.next_page_selector, 0)
            .await
            .map_err(|e| CrawlError::render(Stage::Advancing(page), e))?;
        if !clicked {
            return Err(CrawlError::render(Stage::Advancing(page), "next-page control not found"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fake::{FakeLauncher, FakeSite, test_config};
    use std::collections::HashSet;

    fn driver() -> PaginationDriver {
        PaginationDriver::new(&test_config()).unwrap()
    }

    fn symbol(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_visits_ceil_pages() {
        let launcher = FakeLauncher::new([("SPY", FakeSite::with_holdings("SPDR S&P 500", 500))]);
        let out = driver().crawl(&launcher, &symbol("spy")).await.unwrap();

        assert_eq!(out.tables.len(), 9);
        assert_eq!(launcher.stats.next_clicks(), 8);
        assert_eq!(out.tables.iter().map(PageTable::len).sum::<usize>(), 500);
        assert_eq!(out.tables[8].len(), 20);
        assert_eq!(out.header.name.as_deref(), Some("SPDR S&P 500"));
        assert_eq!(out.header.last_price.as_deref(), Some("101.25"));
        assert_eq!(launcher.stats.navigations(), vec!["fake://etf/SPY".to_string()]);
        assert_eq!((launcher.stats.launched(), launcher.stats.closed()), (1, 1));
    }

    #[tokio::test]
    async fn test_pages_are_distinct_and_ordered() {
        let launcher = FakeLauncher::new([("QQQ", FakeSite::with_holdings("Invesco QQQ", 130))]);
        let out = driver().crawl(&launcher, &symbol("QQQ")).await.unwrap();

        let sizes: Vec<usize> = out.tables.iter().map(PageTable::len).collect();
        assert_eq!(sizes, vec![60, 60, 10]);
        assert_eq!(out.tables[1].rows[0].symbol, "H0060");

        let unique: HashSet<_> = out.tables.iter().flat_map(|t| &t.rows).collect();
        assert_eq!(unique.len(), 130);
    }

    #[tokio::test]
    async fn test_exact_multiple_of_page_size() {
        let launcher = FakeLauncher::new([("IVV", FakeSite::with_holdings("iShares", 120))]);
        let out = driver().crawl(&launcher, &symbol("IVV")).await.unwrap();
        assert_eq!(out.tables.len(), 2);
        assert_eq!(launcher.stats.next_clicks(), 1);
    }

    #[tokio::test]
    async fn test_single_page_fund() {
        let launcher = FakeLauncher::new([("TINY", FakeSite::with_holdings("Tiny Fund", 12))]);
        let out = driver().crawl(&launcher, &symbol("TINY")).await.unwrap();
        assert_eq!(out.tables.len(), 1);
        assert_eq!(out.tables[0].len(), 12);
        assert_eq!(launcher.stats.next_clicks(), 0);
    }

    #[tokio::test]
    async fn test_unknown_symbol_not_found() {
        let launcher = FakeLauncher::new([("SPY", FakeSite::with_holdings("SPDR", 10))]);
        let err = driver().crawl(&launcher, &symbol("ZZZZNOPE")).await.unwrap_err();
        assert!(matches!(err, CrawlError::SymbolNotFound { .. }));
        assert_eq!(launcher.stats.closed(), 1);
    }

    #[tokio::test]
    async fn test_frozen_page_times_out() {
        let mut site = FakeSite::with_holdings("Stuck", 200);
        site.frozen = true;
        let launcher = FakeLauncher::new([("STUCK", site)]);

        let err = driver().crawl(&launcher, &symbol("STUCK")).await.unwrap_err();
        assert!(matches!(err, CrawlError::PaginationTimeout { page: 2, attempts: 10 }));
        assert_eq!(launcher.stats.closed(), 1);
    }

    #[tokio::test]
    async fn test_navigation_failure_is_render_error() {
        let launcher = FakeLauncher::default().unreachable("DOWN");
        let err = driver().crawl(&launcher, &symbol("DOWN")).await.unwrap_err();
        assert!(matches!(err, CrawlError::Render { stage: Stage::Opening, .. }));
        assert_eq!((launcher.stats.launched(), launcher.stats.closed()), (1, 1));
    }

    #[tokio::test]
    async fn test_stale_reads_beyond_budget_time_out() {
        let mut site = FakeSite::with_holdings("Slow", 100);
        site.stale_reads = 50;
        let launcher = FakeLauncher::new([("SLOW", site)]);

        let err = driver().crawl(&launcher, &symbol("SLOW")).await.unwrap_err();
        // The page-size switch is the first thing that has to settle
        assert!(matches!(err, CrawlError::PaginationTimeout { page: 1, .. }));
    }

    #[tokio::test]
    async fn test_missing_holdings_table_is_extraction_error() {
        let mut site = FakeSite::with_holdings("No Table", 80);
        site.no_table = true;
        let launcher = FakeLauncher::new([("NOTBL", site)]);

        let err = driver().crawl(&launcher, &symbol("NOTBL")).await.unwrap_err();
        assert!(matches!(
            err,
            CrawlError::Extraction { page: 1, source: ExtractError::NoMatchingTable(_) }
        ));
        assert!(!err.is_fatal());
        assert_eq!((launcher.stats.launched(), launcher.stats.closed()), (1, 1));
    }

    #[tokio::test]
    async fn test_next_control_vanishing_is_render_error() {
        let mut site = FakeSite::with_holdings("Short Pager", 200);
        site.drop_next_after = Some(2);
        let launcher = FakeLauncher::new([("SHORT", site)]);

        let err = driver().crawl(&launcher, &symbol("SHORT")).await.unwrap_err();
        assert!(matches!(err, CrawlError::Render { stage: Stage::Advancing(3), .. }));
        assert_eq!(launcher.stats.next_clicks(), 1);
        assert_eq!((launcher.stats.launched(), launcher.stats.closed()), (1, 1));
    }

    #[tokio::test]
    async fn test_no_summary_reads_single_page() {
        let mut site = FakeSite::with_holdings("Unsummarised", 130);
        site.no_summary = true;
        let launcher = FakeLauncher::new([("NOSUM", site)]);

        let out = driver().crawl(&launcher, &symbol("NOSUM")).await.unwrap();
        assert_eq!(out.tables.len(), 1);
        assert_eq!(out.tables[0].len(), 60);
        assert_eq!(launcher.stats.next_clicks(), 0);
        assert_eq!((launcher.stats.launched(), launcher.stats.closed()), (1, 1));
    }

    #[tokio::test]
    async fn test_launch_failure_is_fatal() {
        let launcher = FakeLauncher::failing();
        let err = driver().crawl(&launcher, &symbol("SPY")).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(launcher.stats.launched(), 0);
    }

    #[test]
    fn test_holdings_url() {
        let mut config = AppConfig::default();
        config.site.url_template = "https://example.com/etf?type=holdings&symbol={symbol}".into();
        let url = PaginationDriver::new(&config).unwrap().holdings_url(&symbol("vti")).unwrap();
        assert_eq!(url.as_str(), "https://example.com/etf?type=holdings&symbol=VTI");

        let url = PaginationDriver::new(&config).unwrap().holdings_url(&symbol("a&b#c")).unwrap();
        assert_eq!(url.as_str(), "https://example.com/etf?type=holdings&symbol=A%26B%23C");
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query_pairs().count(), 2);

        config.site.url_template = "not a url {symbol}".into();
        let err = PaginationDriver::new(&config).unwrap().holdings_url(&symbol("vti"));
        assert!(matches!(err, Err(CrawlError::Render { stage: Stage::Opening, .. })));
    }
}
