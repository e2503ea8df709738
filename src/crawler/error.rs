use crate::extract::ExtractError;
use std::fmt;
use thiserror::Error;

/// Where in a symbol's crawl a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Opening,
    LocatingPagination,
    LoadingPage(u32),
    Advancing(u32),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Opening => write!(f, "opening"),
            Stage::LocatingPagination => write!(f, "locating pagination"),
            Stage::LoadingPage(n) => write!(f, "loading page {}", n),
            Stage::Advancing(n) => write!(f, "advancing to page {}", n),
        }
    }
}

#[derive(Debug, Error)]
pub enum CrawlError {
    /// No browser could be started. Aborts the whole batch.
    #[error("could not start rendering session: {0}")]
    SessionLaunch(String),

    #[error("symbol not found (no pagination control after {waited_secs}s)")]
    SymbolNotFound { waited_secs: u64 },

    #[error("render error while {stage}: {reason}")]
    Render { stage: Stage, reason: String },

    #[error("pagination timeout: page {page} did not render after {attempts} checks")]
    PaginationTimeout { page: u32, attempts: u32 },

    #[error("extraction failed on page {page}: {source}")]
    Extraction {
        page: u32,
        #[source]
        source: ExtractError,
    },
}

impl CrawlError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, CrawlError::SessionLaunch(_))
    }

    pub fn render(stage: Stage, reason: impl fmt::Display) -> Self {
        CrawlError::Render { stage, reason: reason.to_string() }
    }

    /// Short label for summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            CrawlError::SessionLaunch(_) => "session launch",
            CrawlError::SymbolNotFound { .. } => "symbol not found",
            CrawlError::Render { .. } => "render error",
            CrawlError::PaginationTimeout { .. } => "pagination timeout",
            CrawlError::Extraction { .. } => "extraction error",
        }
    }
}
