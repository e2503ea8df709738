use super::{RenderSession, SessionError, SessionLauncher};
use crate::config::CrawlerConfig;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Launches a local Chrome/Chromium over the DevTools protocol.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    headless: bool,
    load_timeout: Duration,
}

impl ChromeLauncher {
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            headless: config.headless,
            load_timeout: config.max_load_wait(),
        }
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn RenderSession>, SessionError> {
        debug!("Launching browser (headless={})", self.headless);

        let mut builder = BrowserConfig::builder()
            .window_size(1280, 1024)
            .request_timeout(self.load_timeout)
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-timer-throttling")
            .arg("--disable-renderer-backgrounding")
            .arg("--disable-dev-shm-usage");
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(SessionError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        // The handler must be polled for the browser to make progress
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
        });

        let mut session = ChromeSession {
            browser: Some(browser),
            page: None,
            handler_task: Some(handler_task),
        };

        let opened = session.browser_ref()?.new_page("about:blank").await;
        match opened {
            Ok(page) => {
                session.page = Some(page);
                Ok(Box::new(session))
            }
            Err(e) => {
                session.close().await.ok();
                Err(SessionError::Launch(format!("failed to open tab: {}", e)))
            }
        }
    }
}

/// A browser process with a single tab.
pub struct ChromeSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: Option<JoinHandle<()>>,
}

impl ChromeSession {
    fn browser_ref(&self) -> Result<&Browser, SessionError> {
        self.browser
            .as_ref()
            .ok_or_else(|| SessionError::Driver("browser already closed".into()))
    }

    fn page(&self) -> Result<&Page, SessionError> {
        self.page
            .as_ref()
            .ok_or_else(|| SessionError::Driver("no page available".into()))
    }
}

fn driver_err(e: impl std::fmt::Display) -> SessionError {
    SessionError::Driver(e.to_string())
}

#[async_trait]
impl RenderSession for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        debug!("Navigating to {}", url);
        self.page()?
            .goto(url)
            .await
            .map_err(|e| SessionError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn markup(&self) -> Result<String, SessionError> {
        self.page()?.content().await.map_err(driver_err)
    }

    async fn click(&self, selector: &str, index: usize) -> Result<bool, SessionError> {
        let page = self.page()?;
        let elements = page.find_elements(selector).await.map_err(driver_err)?;
        let Some(element) = elements.into_iter().nth(index) else {
            return Ok(false);
        };

        element.scroll_into_view().await.map_err(driver_err)?;
        if let Err(e) = element.click().await {
            // Overlays can swallow synthetic mouse events; fall back to a DOM click
            debug!("Mouse click on '{}' failed ({}), using script click", selector, e);
            let script = format!(
                "(() => {{ const el = document.querySelectorAll({})[{}]; \
                 if (!el) return false; el.click(); return true; }})()",
                serde_json::to_string(selector).map_err(driver_err)?,
                index
            );
            let clicked: serde_json::Value = page
                .evaluate(script.as_str())
                .await
                .map_err(driver_err)?
                .into_value()
                .map_err(driver_err)?;
            return Ok(clicked.as_bool().unwrap_or(false));
        }
        Ok(true)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.page = None;
        let mut result = Ok(());

        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Graceful browser close failed, killing process: {}", e);
                if let Some(Err(kill_err)) = browser.kill().await {
                    warn!("Failed to kill browser: {}", kill_err);
                }
                result = Err(driver_err(e));
            } else if let Err(e) = browser.wait().await {
                debug!("Waiting for browser exit failed: {}", e);
            }
        }

        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        result
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        let Some(mut browser) = self.browser.take() else { return };
        let handler_task = self.handler_task.take();
        warn!("Rendering session dropped without close; shutting browser down");

        if let Ok(rt) = tokio::runtime::Handle::try_current() {
            rt.spawn(async move {
                if browser.close().await.is_err() {
                    browser.kill().await;
                }
                if let Some(task) = handler_task {
                    task.abort();
                }
            });
        }
    }
}
