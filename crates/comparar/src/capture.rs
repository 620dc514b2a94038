//! Screenshot capture for headless browsers.
//!
//! The orchestrator only sees the [`CaptureAdapter`] trait. When compiled with
//! the `browser` feature, [`ChromiumCapture`] drives Chromium over the Chrome
//! `DevTools` Protocol via chromiumoxide. Without the feature it refuses to
//! launch, so runs fail fast with a clear message.

use crate::config::{Viewport, VisualRegressionConfig};
use crate::result::CompararResult;
use async_trait::async_trait;
use std::time::Duration;

/// Quiet window that counts as network idle
pub const NETWORK_IDLE_THRESHOLD_MS: u64 = 500;

/// How often resource activity is sampled while waiting for idle
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// One screenshot to take
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Absolute URL to navigate to
    pub url: String,
    /// Viewport to size the page to
    pub viewport: Viewport,
    /// Browser name from the configuration
    pub browser: String,
}

impl CaptureRequest {
    /// Create a request
    #[must_use]
    pub fn new(url: impl Into<String>, viewport: Viewport, browser: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            viewport,
            browser: browser.into(),
        }
    }
}

/// Produces full-page PNG screenshots
#[async_trait]
pub trait CaptureAdapter: Send + Sync {
    /// Navigate to `request.url` at `request.viewport`, wait for the page to
    /// settle and return the encoded screenshot
    async fn capture(&self, request: &CaptureRequest) -> CompararResult<Vec<u8>>;
}

/// Timing knobs for page settling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Fixed wait after the network goes idle
    pub settle_delay_ms: u64,
    /// Quiet window that counts as network idle
    pub network_idle_ms: u64,
    /// Upper bound on the idle wait
    pub idle_timeout_ms: u64,
    /// Sampling interval for the idle wait
    pub poll_interval_ms: u64,
    /// Capture the whole scrollable page rather than the viewport
    pub full_page: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: crate::config::DEFAULT_SETTLE_DELAY_MS,
            network_idle_ms: NETWORK_IDLE_THRESHOLD_MS,
            idle_timeout_ms: crate::config::DEFAULT_CAPTURE_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            full_page: true,
        }
    }
}

impl CaptureSettings {
    /// Derive settings from a run configuration
    #[must_use]
    pub fn from_config(config: &VisualRegressionConfig) -> Self {
        Self {
            settle_delay_ms: config.settle_delay_ms,
            network_idle_ms: config.network_idle_ms,
            idle_timeout_ms: config.capture_timeout_ms,
            ..Self::default()
        }
    }

    /// Settle delay as a Duration
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Poll interval as a Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Tracks resource activity samples until a quiet window has elapsed.
///
/// Each sample is the number of resources the page has requested so far; the
/// network counts as idle once that number has not changed for the quiet
/// window.
#[derive(Debug, Clone)]
pub struct IdleTracker {
    quiet: Duration,
    last_count: Option<u64>,
    stable_for: Duration,
}

impl IdleTracker {
    /// Create a tracker for the given quiet window
    #[must_use]
    pub const fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            last_count: None,
            stable_for: Duration::ZERO,
        }
    }

    /// Record a sample taken `elapsed` after the previous one; returns whether
    /// the network is now idle
    pub fn observe(&mut self, count: u64, elapsed: Duration) -> bool {
        if self.last_count == Some(count) {
            self.stable_for += elapsed;
        } else {
            self.last_count = Some(count);
            self.stable_for = Duration::ZERO;
        }
        self.is_idle()
    }

    /// Whether the quiet window has elapsed
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.last_count.is_some() && self.stable_for >= self.quiet
    }
}

/// Browser launch options
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Run in headless mode
    pub headless: bool,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl BrowserOptions {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

/// Browser names the Chromium adapter answers to
pub const CHROMIUM_BROWSERS: &[&str] = &["chromium", "chrome"];

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
mod cdp {
    use super::{
        BrowserOptions, CaptureAdapter, CaptureRequest, CaptureSettings, IdleTracker,
        CHROMIUM_BROWSERS,
    };
    use crate::result::{CompararError, CompararResult};
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
    use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
    use chromiumoxide::page::{Page as CdpPage, ScreenshotParams};
    use futures::StreamExt;
    use std::time::{Duration, Instant};
    use tokio::sync::Mutex;

    const RESOURCE_COUNT_JS: &str = "performance.getEntriesByType('resource').length";

    /// Chromium driven over CDP; one browser process, one page per capture
    #[derive(Debug)]
    pub struct ChromiumCapture {
        settings: CaptureSettings,
        inner: Mutex<CdpBrowser>,
        handle: tokio::task::JoinHandle<()>,
    }

    impl ChromiumCapture {
        /// Launch a new browser instance
        ///
        /// # Errors
        ///
        /// Returns error if browser cannot be launched
        pub async fn launch(
            options: BrowserOptions,
            settings: CaptureSettings,
        ) -> CompararResult<Self> {
            let mut builder = CdpConfig::builder();

            if !options.headless {
                builder = builder.with_head();
            }

            if !options.sandbox {
                builder = builder.no_sandbox();
            }

            if let Some(ref path) = options.chromium_path {
                builder = builder.chrome_executable(path);
            }

            let cdp_config = builder
                .build()
                .map_err(|e| CompararError::BrowserLaunch {
                    message: e.to_string(),
                })?;

            let (browser, mut handler) = CdpBrowser::launch(cdp_config).await.map_err(|e| {
                CompararError::BrowserLaunch {
                    message: e.to_string(),
                }
            })?;

            let handle = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            tracing::debug!("chromium launched");

            Ok(Self {
                settings,
                inner: Mutex::new(browser),
                handle,
            })
        }

        /// Close the browser
        pub async fn close(self) -> CompararResult<()> {
            let mut browser = self.inner.lock().await;
            browser
                .close()
                .await
                .map_err(|e| CompararError::BrowserLaunch {
                    message: e.to_string(),
                })?;
            drop(browser);
            self.handle.abort();
            Ok(())
        }

        async fn new_page(&self, url: &str) -> CompararResult<CdpPage> {
            let browser = self.inner.lock().await;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| CompararError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })
        }

        async fn capture_on(&self, page: &CdpPage, request: &CaptureRequest) -> CompararResult<Vec<u8>> {
            let url = request.url.as_str();
            let navigation = |e: chromiumoxide::error::CdpError| CompararError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            };

            let metrics = SetDeviceMetricsOverrideParams::new(
                i64::from(request.viewport.width),
                i64::from(request.viewport.height),
                1.0,
                false,
            );
            page.execute(metrics).await.map_err(navigation)?;

            page.goto(url).await.map_err(navigation)?;
            page.wait_for_navigation().await.map_err(navigation)?;

            self.wait_for_network_idle(page).await?;
            tokio::time::sleep(self.settings.settle_delay()).await;

            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .full_page(self.settings.full_page)
                .build();
            page.screenshot(params)
                .await
                .map_err(|e| CompararError::Screenshot {
                    message: e.to_string(),
                })
        }

        /// Poll the resource timeline until it stops growing, bounded by the
        /// idle timeout
        async fn wait_for_network_idle(&self, page: &CdpPage) -> CompararResult<()> {
            let started = Instant::now();
            let limit = Duration::from_millis(self.settings.idle_timeout_ms);
            let mut tracker = IdleTracker::new(Duration::from_millis(self.settings.network_idle_ms));
            let mut last_sample = Instant::now();

            loop {
                // A failed sample counts as "no activity"; the timeout still bounds the wait.
                let count = match page.evaluate(RESOURCE_COUNT_JS).await {
                    Ok(result) => result.into_value::<u64>().unwrap_or(0),
                    Err(_) => 0,
                };
                let now = Instant::now();
                if tracker.observe(count, now - last_sample) {
                    return Ok(());
                }
                last_sample = now;
                if started.elapsed() >= limit {
                    return Err(CompararError::Timeout {
                        ms: self.settings.idle_timeout_ms,
                    });
                }
                tokio::time::sleep(self.settings.poll_interval()).await;
            }
        }
    }

    #[async_trait]
    impl CaptureAdapter for ChromiumCapture {
        async fn capture(&self, request: &CaptureRequest) -> CompararResult<Vec<u8>> {
            if !CHROMIUM_BROWSERS.contains(&request.browser.as_str()) {
                return Err(CompararError::UnsupportedBrowser {
                    name: request.browser.clone(),
                });
            }

            let page = self.new_page(&request.url).await?;
            let result = self.capture_on(&page, request).await;
            if let Err(e) = page.close().await {
                tracing::debug!(error = %e, "failed to close page");
            }
            result
        }
    }
}

// ============================================================================
// Stub Implementation (when `browser` feature is NOT enabled)
// ============================================================================

#[cfg(not(feature = "browser"))]
mod stub {
    use super::{BrowserOptions, CaptureAdapter, CaptureRequest, CaptureSettings};
    use crate::result::{CompararError, CompararResult};
    use async_trait::async_trait;

    /// Chromium capture (unavailable when `browser` feature disabled)
    #[derive(Debug)]
    pub struct ChromiumCapture {
        _settings: CaptureSettings,
    }

    impl ChromiumCapture {
        /// Launch a new browser instance
        ///
        /// # Errors
        ///
        /// Always returns error: the `browser` feature is not enabled
        pub async fn launch(
            _options: BrowserOptions,
            _settings: CaptureSettings,
        ) -> CompararResult<Self> {
            Err(CompararError::BrowserLaunch {
                message: "Browser feature not enabled. Enable 'browser' feature for real CDP support."
                    .to_string(),
            })
        }

        /// Close the browser
        pub async fn close(self) -> CompararResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl CaptureAdapter for ChromiumCapture {
        async fn capture(&self, request: &CaptureRequest) -> CompararResult<Vec<u8>> {
            Err(CompararError::UnsupportedBrowser {
                name: request.browser.clone(),
            })
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::ChromiumCapture;

#[cfg(not(feature = "browser"))]
pub use stub::ChromiumCapture;
