//! Comparar: visual regression between a local build and production
//!
//! Captures every configured route at every viewport and browser on both
//! origins, diffs the screenshots pixel by pixel and aggregates a report.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      COMPARAR Pipeline                            │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌──────────────┐   ┌──────────────┐            │
//! │  │ Combination │──►│ Capture      │──►│ Artifact     │            │
//! │  │ enumerate   │   │ local + prod │   │ store (PNG)  │            │
//! │  └─────────────┘   └──────────────┘   └──────┬───────┘            │
//! │                                              ▼                    │
//! │  ┌─────────────┐   ┌──────────────┐   ┌──────────────┐            │
//! │  │ Report      │◄──│ Pixel        │◄──│ Codec        │            │
//! │  │ html/json   │   │ comparator   │   │ decode RGBA  │            │
//! │  └─────────────┘   └──────────────┘   └──────────────┘            │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use comparar::{ChromiumCapture, BrowserOptions, CaptureSettings, VisualRegressionConfig,
//!     VisualRegressionRunner, ExitPolicy};
//! use std::sync::Arc;
//!
//! # async fn run() -> comparar::CompararResult<()> {
//! let config = VisualRegressionConfig::default();
//! let capture = ChromiumCapture::launch(BrowserOptions::default(), CaptureSettings::from_config(&config)).await?;
//! let runner = VisualRegressionRunner::new(config.clone(), Arc::new(capture));
//! let report = runner.run_all().await?;
//! assert!(report.is_success(ExitPolicy::from_config(&config)));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod artifacts;
mod capture;
mod codec;
mod config;
mod orchestrator;
mod pixelmatch;
mod report;
mod result;

pub use artifacts::{
    route_slug, screenshot_name, write_atomic, ArtifactPaths, ArtifactStore, DIFF_SUFFIX,
};
pub use capture::{
    BrowserOptions, CaptureAdapter, CaptureRequest, CaptureSettings, ChromiumCapture,
    IdleTracker, CHROMIUM_BROWSERS, DEFAULT_POLL_INTERVAL_MS, NETWORK_IDLE_THRESHOLD_MS,
};
pub use codec::{decode_png, encode_png, Capture};
pub use config::{
    join_url, ArtifactLayout, ReportFormat, Viewport, VisualRegressionConfig,
    DEFAULT_CAPTURE_TIMEOUT_MS, DEFAULT_CONCURRENCY, DEFAULT_NETWORK_IDLE_MS,
    DEFAULT_PER_PIXEL_THRESHOLD, DEFAULT_SETTLE_DELAY_MS, DEFAULT_THRESHOLD,
};
pub use orchestrator::{
    ensure_distinct_names, Combination, ProgressHook, VisualRegressionRunner,
};
pub use pixelmatch::{compare, CompareOptions, PixelDiff};
pub use report::{
    format_file_size, format_percentage, relative_path, render_html, render_json, render_text,
    write_report, ComparisonResult, ComparisonStatus, ExitPolicy, Report, ReportSummary,
};
pub use result::{CompararError, CompararResult};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        compare, decode_png, encode_png, Capture, CaptureAdapter, CaptureRequest,
        CompararError, CompararResult, CompareOptions, ComparisonResult, ComparisonStatus,
        ExitPolicy, Report, Viewport, VisualRegressionConfig, VisualRegressionRunner,
    };
}
