use super::PageSnapshot;
use crate::config::CaptureConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

const CHROMIUM_PATH_ENV: &str = "HASHPRICE_TRACKER_CHROMIUM";

fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    None
}

/// Headless-Chromium page capture. A browser is launched per capture and
/// torn down afterwards; one run takes one snapshot.
pub struct ChromiumCapture {
    config: CaptureConfig,
}

impl ChromiumCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    async fn snapshot_page(&self, browser: &Browser, url: &str, dest: &Path) -> Result<()> {
        let timeout = Duration::from_secs(self.config.navigation_timeout_secs);

        let page = tokio::time::timeout(timeout, browser.new_page(url))
            .await
            .map_err(|_| {
                AppError::Capture(format!("Navigation timed out after {}s", timeout.as_secs()))
            })?
            .map_err(|e| AppError::Capture(format!("Failed to load {}: {}", url, e)))?;

        let _ = tokio::time::timeout(timeout, page.wait_for_navigation()).await;

        if self.config.settle_delay_secs > 0 {
            // Chart-heavy pages keep painting after the load event fires
            tokio::time::sleep(Duration::from_secs(self.config.settle_delay_secs)).await;
        }

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();

        page.save_screenshot(params, dest)
            .await
            .map_err(|e| AppError::Capture(format!("Failed to write screenshot: {}", e)))?;

        debug!(path = ?dest, "Snapshot written");

        Ok(())
    }
}

#[async_trait]
impl PageSnapshot for ChromiumCapture {
    #[instrument(name = "Capturing page snapshot", skip(self, dest))]
    async fn capture(&self, url: &str, dest: &Path) -> Result<()> {
        let chrome_path = find_chromium().ok_or_else(|| {
            AppError::Capture(format!(
                "Chromium not found; install google-chrome or set {}",
                CHROMIUM_PATH_ENV
            ))
        })?;

        let browser_config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(self.config.viewport_width, self.config.viewport_height)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .build()
            .map_err(|e| AppError::Capture(format!("Failed to build browser config: {}", e)))?;

        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| AppError::Capture(format!("Failed to launch Chromium: {}", e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let result = self.snapshot_page(&browser, url, dest).await;

        let _ = browser.close().await;
        handler_task.abort();

        result
    }
}
