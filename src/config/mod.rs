use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub crawler: CrawlerConfig,
    pub site: SiteConfig,
    pub output: OutputConfig,
}

/// Rendering session and polling behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlerConfig {
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Upper bound on the wait for the first render of a holdings page.
    #[serde(default = "default_max_load_wait_secs")]
    pub max_load_wait_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,
}

/// Where the holdings page lives and how its controls are found
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    /// `{symbol}` is replaced by the fund ticker.
    #[serde(default = "default_url_template")]
    pub url_template: String,

    #[serde(default = "default_table_marker")]
    pub table_marker: String,

    #[serde(default = "default_page_size_selector")]
    pub page_size_selector: String,

    #[serde(default = "default_summary_selector")]
    pub summary_selector: String,

    #[serde(default = "default_next_page_selector")]
    pub next_page_selector: String,

    #[serde(default = "default_fund_name_selector")]
    pub fund_name_selector: String,

    #[serde(default = "default_last_price_selector")]
    pub last_price_selector: String,
}

/// Output file locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_log_file")]
    pub log_file: String,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}
fn default_max_load_wait_secs() -> u64 {
    15
}
fn default_poll_interval_ms() -> u64 {
    250
}
fn default_poll_max_attempts() -> u32 {
    40
}
fn default_url_template() -> String {
    "https://www.schwab.wallst.com/schwab/Prospect/research/etfs/schwabETF/index.asp?type=holdings&symbol={symbol}".to_string()
}
fn default_table_marker() -> String {
    "Symbol".to_string()
}
fn default_page_size_selector() -> String {
    "#PaginationContainer .pageSize a".to_string()
}
fn default_summary_selector() -> String {
    "#PaginationContainer .paginationSummary".to_string()
}
fn default_next_page_selector() -> String {
    "#PaginationContainer .next a".to_string()
}
fn default_fund_name_selector() -> String {
    "#modFirstHeader .fundName".to_string()
}
fn default_last_price_selector() -> String {
    "#modFirstHeader .lastPrice".to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_log_file() -> String {
    "etf-log.csv".to_string()
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            headless: true,
            max_load_wait_secs: default_max_load_wait_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_max_attempts: default_poll_max_attempts(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            url_template: default_url_template(),
            table_marker: default_table_marker(),
            page_size_selector: default_page_size_selector(),
            summary_selector: default_summary_selector(),
            next_page_selector: default_next_page_selector(),
            fund_name_selector: default_fund_name_selector(),
            last_price_selector: default_last_price_selector(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            log_file: default_log_file(),
        }
    }
}

impl CrawlerConfig {
    pub fn max_load_wait(&self) -> Duration {
        Duration::from_secs(self.max_load_wait_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("ETF").separator("__"))
            .build()
            .context("Failed to read configuration")?;

        cfg.try_deserialize().context("Invalid configuration")
    }
}
