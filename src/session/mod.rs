//! Rendering sessions: a browser tab that runs page scripts and hands back
//! the rendered markup.
//!
//! The crawler only talks to [`RenderSession`] and [`SessionLauncher`], so the
//! Chrome implementation can be swapped for the scripted one used in tests.

pub mod chrome;
#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use thiserror::Error;

pub use self::chrome::ChromeLauncher;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation error: {0}")]
    Navigation(String),

    #[error("browser driver error: {0}")]
    Driver(String),
}

// ── Session traits ────────────────────────────────────────────────────────────

/// One open browser tab.
#[async_trait]
pub trait RenderSession: Send + Sync {
    /// Load `url` and wait for the document to finish loading.
    async fn navigate(&self, url: &str) -> Result<(), SessionError>;

    /// Current rendered DOM as HTML.
    async fn markup(&self) -> Result<String, SessionError>;

    /// Scroll the `index`-th element matching `selector` into view and click
    /// it. `Ok(false)` when there is no such element.
    async fn click(&self, selector: &str, index: usize) -> Result<bool, SessionError>;

    /// Shut the session down. Safe to call more than once.
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Opens fresh sessions, one per crawled symbol.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn RenderSession>, SessionError>;
}
