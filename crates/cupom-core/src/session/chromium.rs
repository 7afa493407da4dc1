//! Chrome/Chromium driver over the DevTools protocol.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::{Browser, BrowserConfig as CdpConfig, Element, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::driver::{BrowserLauncher, DriverResult, Locator, PortalDriver};
use crate::error::DriverError;
use crate::models::config::BrowserConfig;

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Windows
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];

const CHROME_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

fn protocol(e: impl std::fmt::Display) -> DriverError {
    DriverError::Protocol(e.to_string())
}

/// Launches a local Chrome/Chromium for each session.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher;

impl ChromiumLauncher {
    pub fn new() -> Self {
        Self
    }

    /// Find a browser executable: configured path, well-known paths, then `PATH`.
    pub fn find_executable(configured: Option<&Path>) -> DriverResult<PathBuf> {
        if let Some(path) = configured {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(DriverError::Launch(format!(
                "configured browser not found: {}",
                path.display()
            )));
        }

        for path in CHROME_PATHS {
            let p = Path::new(path);
            if p.exists() {
                debug!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in CHROME_COMMANDS {
            if let Ok(path) = which::which(cmd) {
                debug!("Found Chrome in PATH: {}", path.display());
                return Ok(path);
            }
        }

        Err(DriverError::Launch(
            "Chrome/Chromium not found; install it or set browser.chrome_executable".to_string(),
        ))
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    type Driver = ChromiumDriver;

    async fn launch(&self, config: &BrowserConfig) -> DriverResult<ChromiumDriver> {
        let chrome = Self::find_executable(config.chrome_executable.as_deref())?;
        info!("Launching browser (headless={})", config.headless);

        let mut builder = CdpConfig::builder().chrome_executable(chrome);

        // with_head means NOT headless
        if !config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-translate");

        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }

        let cdp_config = builder.build().map_err(DriverError::Launch)?;

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(DriverError::Launch(e.to_string()));
            }
        };

        if let Some(agent) = &config.user_agent {
            page.execute(SetUserAgentOverrideParams::new(agent.clone()))
                .await
                .map_err(protocol)?;
        }

        Ok(ChromiumDriver {
            page,
            browser: Mutex::new(Some(browser)),
            handler: Mutex::new(Some(handler)),
        })
    }
}

/// A single page in a launched browser.
pub struct ChromiumDriver {
    page: Page,
    browser: Mutex<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl PortalDriver for ChromiumDriver {
    type Element = Element;

    async fn navigate(&self, url: &str, timeout: Duration) -> DriverResult<()> {
        info!("Navigating to {}", url);
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(DriverError::Navigation)?;

        tokio::time::timeout(timeout, self.page.execute(params))
            .await
            .map_err(|_| {
                DriverError::Timeout(format!(
                    "navigation to {} after {}s",
                    url,
                    timeout.as_secs()
                ))
            })?
            .map_err(|e| DriverError::Navigation(e.to_string()))?;

        Ok(())
    }

    async fn find(&self, locator: &Locator) -> DriverResult<Option<Element>> {
        Ok(self.find_all(locator).await?.into_iter().next())
    }

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<Element>> {
        self.page
            .find_elements(locator.to_css())
            .await
            .or_else(|e| {
                // No match is reported as a protocol error by some Chrome versions
                debug!("Lookup of {} failed: {}", locator, e);
                Ok(Vec::new())
            })
    }

    async fn text(&self, element: &Element) -> DriverResult<String> {
        let text = element.inner_text().await.map_err(protocol)?;
        Ok(text.unwrap_or_default().trim().to_string())
    }

    async fn attribute(&self, element: &Element, name: &str) -> DriverResult<Option<String>> {
        element.attribute(name).await.map_err(protocol)
    }

    async fn clear_and_type(&self, element: &Element, text: &str) -> DriverResult<()> {
        element
            .call_js_fn("function() { this.value = ''; }", false)
            .await
            .map_err(protocol)?;
        element.click().await.map_err(protocol)?;
        element.type_str(text).await.map_err(protocol)?;
        Ok(())
    }

    async fn click(&self, element: &Element) -> DriverResult<()> {
        element.click().await.map_err(protocol)?;
        Ok(())
    }

    async fn scroll_into_view(&self, element: &Element) -> DriverResult<()> {
        element.scroll_into_view().await.map_err(protocol)?;
        Ok(())
    }

    async fn rows(&self, table: &Element) -> DriverResult<Vec<Vec<String>>> {
        let mut rows = Vec::new();
        for row in table.find_elements("tr").await.map_err(protocol)? {
            let mut cells = Vec::new();
            for cell in row.find_elements("th, td").await.unwrap_or_default() {
                let text = cell.inner_text().await.map_err(protocol)?;
                cells.push(text.unwrap_or_default().trim().to_string());
            }
            rows.push(cells);
        }
        Ok(rows)
    }

    async fn close(&self) -> DriverResult<()> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };

        debug!("Closing browser");
        let result = browser.close().await.map(|_| ()).map_err(protocol);
        let _ = browser.wait().await;

        if let Some(handler) = self.handler.lock().await.take() {
            handler.abort();
        }
        result
    }
}
