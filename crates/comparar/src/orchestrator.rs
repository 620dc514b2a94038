//! Comparison orchestrator.
//!
//! Enumerates (route, viewport, browser) combinations and drives each through
//! capture, persistence and comparison with a bounded number in flight.
//!
//! ## Outcomes
//!
//! | Step that fails            | Result                       |
//! |----------------------------|------------------------------|
//! | local capture              | `Errored`                    |
//! | production unreachable     | `Degraded`, local kept       |
//! | other production failure   | `Errored`, local kept        |
//! | decode / size mismatch     | `Errored`                    |
//! | task panic                 | `Errored`                    |
//! | writing any artifact       | run aborts with `Storage`    |
//!
//! Errors the adapter reports as run-fatal (see
//! [`CompararError::is_run_fatal`]) abort the run as well. Tasks still in
//! flight when a run aborts are cancelled.

use crate::artifacts::{screenshot_name, ArtifactStore};
use crate::capture::{CaptureAdapter, CaptureRequest};
use crate::codec::{decode_png, encode_png};
use crate::config::{join_url, Viewport, VisualRegressionConfig};
use crate::pixelmatch::{compare, CompareOptions, PixelDiff};
use crate::report::{format_percentage, ComparisonResult, ComparisonStatus, Report};
use crate::result::{CompararError, CompararResult};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One (route, viewport, browser) triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Combination {
    /// Position in enumeration order
    pub index: usize,
    /// Route path
    pub route: String,
    /// Viewport
    pub viewport: Viewport,
    /// Browser name
    pub browser: String,
}

impl Combination {
    /// Create a combination
    #[must_use]
    pub fn new(
        index: usize,
        route: impl Into<String>,
        viewport: Viewport,
        browser: impl Into<String>,
    ) -> Self {
        Self {
            index,
            route: route.into(),
            viewport,
            browser: browser.into(),
        }
    }

    /// Cartesian product with routes outermost and browsers innermost
    #[must_use]
    pub fn enumerate(routes: &[String], viewports: &[Viewport], browsers: &[String]) -> Vec<Self> {
        let mut combinations =
            Vec::with_capacity(routes.len() * viewports.len() * browsers.len());
        for route in routes {
            for viewport in viewports {
                for browser in browsers {
                    combinations.push(Self::new(
                        combinations.len(),
                        route.clone(),
                        viewport.clone(),
                        browser.clone(),
                    ));
                }
            }
        }
        combinations
    }

    /// Artifact base name, e.g. `home_mobile_chromium`
    #[must_use]
    pub fn name(&self) -> String {
        screenshot_name(&self.route, &self.viewport, &self.browser)
    }
}

impl std::fmt::Display for Combination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {} [{}]", self.route, self.viewport, self.browser)
    }
}

/// Reject combination lists where two entries would share artifact files
///
/// # Errors
///
/// Returns [`CompararError::Config`] naming the first colliding pair
pub fn ensure_distinct_names(combinations: &[Combination]) -> CompararResult<()> {
    let mut seen: HashMap<String, &Combination> = HashMap::with_capacity(combinations.len());
    for combination in combinations {
        let name = combination.name();
        if let Some(previous) = seen.get(&name) {
            return Err(CompararError::config(format!(
                "'{previous}' and '{combination}' both write artifacts named '{name}'"
            )));
        }
        seen.insert(name, combination);
    }
    Ok(())
}

/// Callback invoked as each combination finishes, in completion order
pub type ProgressHook = Arc<dyn Fn(&ComparisonResult) + Send + Sync>;

struct Pipeline {
    config: VisualRegressionConfig,
    adapter: Arc<dyn CaptureAdapter>,
    store: ArtifactStore,
    options: CompareOptions,
}

/// Runs the capture-compare pipeline for a configuration
pub struct VisualRegressionRunner {
    pipeline: Arc<Pipeline>,
    progress: Option<ProgressHook>,
}

impl std::fmt::Debug for VisualRegressionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualRegressionRunner")
            .field("config", &self.pipeline.config)
            .field("progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

impl VisualRegressionRunner {
    /// Create a runner over a capture adapter
    #[must_use]
    pub fn new(config: VisualRegressionConfig, adapter: Arc<dyn CaptureAdapter>) -> Self {
        let store = ArtifactStore::new(config.artifacts.clone());
        let options = config.compare_options();
        Self {
            pipeline: Arc::new(Pipeline {
                config,
                adapter,
                store,
                options,
            }),
            progress: None,
        }
    }

    /// Report each result as soon as its combination completes
    #[must_use]
    pub fn with_progress(mut self, hook: ProgressHook) -> Self {
        self.progress = Some(hook);
        self
    }

    /// The run configuration
    #[must_use]
    pub fn config(&self) -> &VisualRegressionConfig {
        &self.pipeline.config
    }

    /// The artifact store
    #[must_use]
    pub fn store(&self) -> &ArtifactStore {
        &self.pipeline.store
    }

    /// Every combination the configuration describes
    #[must_use]
    pub fn combinations(&self) -> Vec<Combination> {
        let config = &self.pipeline.config;
        Combination::enumerate(&config.routes, &config.viewports, &config.browsers)
    }

    /// Validate the configuration and run every combination
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or an artifact cannot be
    /// written
    pub async fn run_all(&self) -> CompararResult<Report> {
        self.pipeline.config.validate()?;
        self.run_combinations(&self.combinations()).await
    }

    /// Run the given combinations; the report keeps their order
    ///
    /// # Errors
    ///
    /// Returns error if two combinations share an artifact name, the artifact
    /// directories cannot be prepared or an artifact cannot be written
    pub async fn run_combinations(&self, combinations: &[Combination]) -> CompararResult<Report> {
        ensure_distinct_names(combinations)?;
        let pipeline = &self.pipeline;
        pipeline.store.ensure_dirs().await?;
        if pipeline.config.clean_diffs {
            let removed = pipeline.store.clean_diffs().await?;
            debug!(removed, "Removed stale diff images");
        }

        let concurrency = pipeline.config.concurrency.max(1);
        info!(
            combinations = combinations.len(),
            concurrency, "Starting visual regression run"
        );

        let mut slots: Vec<Option<ComparisonResult>> = vec![None; combinations.len()];
        let mut completed = stream::iter(combinations.iter().cloned().enumerate())
            .map(|(slot, combination)| {
                let pipeline = Arc::clone(pipeline);
                async move { (slot, run_isolated(pipeline, combination).await) }
            })
            .buffer_unordered(concurrency);

        while let Some((slot, outcome)) = completed.next().await {
            let result = outcome?;
            if let Some(hook) = &self.progress {
                hook(&result);
            }
            slots[slot] = Some(result);
        }

        let report = Report::new(slots.into_iter().flatten().collect());
        let summary = report.summary();
        info!(
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            degraded = summary.degraded,
            errored = summary.errored,
            "Visual regression run finished"
        );
        Ok(report)
    }
}

/// Aborts the task when dropped, so an abandoned run stops capturing
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run one combination on its own task so a panic stays contained
async fn run_isolated(
    pipeline: Arc<Pipeline>,
    combination: Combination,
) -> CompararResult<ComparisonResult> {
    let threshold = pipeline.config.threshold;
    let fallback = combination.clone();
    let mut task = AbortOnDrop(tokio::spawn(async move {
        pipeline.run_one(&combination).await
    }));

    match (&mut task.0).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let message = if e.is_panic() {
                "comparison task panicked"
            } else {
                "comparison task was cancelled"
            };
            warn!(combination = %fallback, "{message}");
            Ok(ComparisonResult::errored(&fallback, threshold, message))
        }
    }
}

impl Pipeline {
    async fn run_one(&self, combination: &Combination) -> CompararResult<ComparisonResult> {
        let started = Instant::now();
        let threshold = self.config.threshold;
        let paths = self.store.paths(&combination.name());
        debug!(combination = %combination, "Capturing");

        let local_url = join_url(&self.config.local_origin, &combination.route);
        let local = match self.capture(local_url, combination).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_run_fatal() => return Err(e),
            Err(e) => {
                warn!(combination = %combination, error = %e, "Local capture failed");
                return Ok(ComparisonResult::errored(
                    combination,
                    threshold,
                    format!("local capture failed: {e}"),
                )
                .with_duration(started.elapsed()));
            }
        };
        self.store.write(&paths.local, &local).await?;

        let production_url = join_url(&self.config.production_origin, &combination.route);
        let production = match self.capture(production_url, combination).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_run_fatal() => return Err(e),
            Err(e) if e.is_capture_failure() => {
                warn!(combination = %combination, error = %e, "Production unreachable");
                return Ok(ComparisonResult::degraded(
                    combination,
                    threshold,
                    paths.local.clone(),
                    format!("production unreachable: {e}"),
                )
                .with_duration(started.elapsed()));
            }
            Err(e) => {
                warn!(combination = %combination, error = %e, "Production capture failed");
                return Ok(ComparisonResult::errored(
                    combination,
                    threshold,
                    format!("production capture failed: {e}"),
                )
                .with_artifacts(Some(paths.local.clone()), None)
                .with_duration(started.elapsed()));
            }
        };
        self.store.write(&paths.production, &production).await?;

        let errored = |message: String| {
            ComparisonResult::errored(combination, threshold, message)
                .with_artifacts(Some(paths.local.clone()), Some(paths.production.clone()))
                .with_duration(started.elapsed())
        };

        let options = self.options.clone();
        let diff = match tokio::task::spawn_blocking(move || decode_and_compare(&local, &production, &options)).await {
            Ok(Ok(diff)) => diff,
            Ok(Err(e)) => {
                warn!(combination = %combination, error = %e, "Comparison failed");
                return Ok(errored(e.to_string()));
            }
            Err(e) => return Ok(errored(format!("comparison panicked: {e}"))),
        };

        let mut result = ComparisonResult::compared(
            combination,
            threshold,
            diff.num_diff_pixels,
            diff.diff.total_pixels(),
            &paths,
        );

        if result.is_different {
            let encoded = match tokio::task::spawn_blocking(move || encode_png(&diff.diff)).await {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(e)) => return Ok(errored(e.to_string())),
                Err(e) => return Ok(errored(format!("diff encoding panicked: {e}"))),
            };
            self.store.write(&paths.diff, &encoded).await?;
            result = result.with_diff_bytes(encoded.len() as u64);
        }

        let result = result.with_duration(started.elapsed());
        log_result(&result);
        Ok(result)
    }

    async fn capture(&self, url: String, combination: &Combination) -> CompararResult<Vec<u8>> {
        let request = CaptureRequest::new(url, combination.viewport.clone(), combination.browser.clone());
        match tokio::time::timeout(self.config.capture_timeout(), self.adapter.capture(&request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CompararError::Timeout {
                ms: self.config.capture_timeout_ms,
            }),
        }
    }
}

fn decode_and_compare(
    local: &[u8],
    production: &[u8],
    options: &CompareOptions,
) -> CompararResult<PixelDiff> {
    let local = decode_png(local)?;
    let production = decode_png(production)?;
    compare(&local, &production, options)
}

fn log_result(result: &ComparisonResult) {
    let diff = result
        .diff_percentage
        .map_or_else(|| "-".to_string(), format_percentage);
    match result.status {
        ComparisonStatus::Passed => info!(
            route = %result.route,
            viewport = %result.viewport.name,
            browser = %result.browser,
            diff = %diff,
            "Visual comparison passed"
        ),
        _ => warn!(
            route = %result.route,
            viewport = %result.viewport.name,
            browser = %result.browser,
            diff = %diff,
            threshold = %format_percentage(result.threshold),
            diff_path = ?result.diff_path,
            "Visual difference above threshold"
        ),
    }
}
