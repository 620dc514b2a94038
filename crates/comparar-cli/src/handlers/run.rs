//! Run command handler: the full capture and compare pipeline

use super::{resolve_config, runtime};
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::ProgressReporter;
use crate::RunArgs;
use comparar::{
    write_report, BrowserOptions, CaptureAdapter, CaptureSettings, ChromiumCapture,
    ComparisonResult, ExitPolicy, VisualRegressionConfig, VisualRegressionRunner,
};
use std::sync::Arc;
use std::time::Instant;

/// Apply command-line overrides on top of a loaded configuration
#[must_use]
pub fn apply_overrides(mut config: VisualRegressionConfig, args: &RunArgs) -> VisualRegressionConfig {
    if !args.routes.is_empty() {
        config.routes.clone_from(&args.routes);
    }
    if !args.viewports.is_empty() {
        config.viewports.clone_from(&args.viewports);
    }
    if !args.browsers.is_empty() {
        config.browsers.clone_from(&args.browsers);
    }
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(threshold) = args.per_pixel_threshold {
        config.per_pixel_threshold = threshold;
    }
    if args.include_aa {
        config.include_anti_aliasing = true;
    }
    if let Some(origin) = &args.local_origin {
        config.local_origin.clone_from(origin);
    }
    if let Some(origin) = &args.production_origin {
        config.production_origin.clone_from(origin);
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(ms) = args.settle_delay_ms {
        config.settle_delay_ms = ms;
    }
    if let Some(ms) = args.capture_timeout_ms {
        config.capture_timeout_ms = ms;
    }
    if let Some(path) = &args.report {
        config.report_path.clone_from(path);
    }
    if let Some(format) = args.format {
        config.report_format = format.into();
    }
    if args.degraded_is_failure {
        config.degraded_is_failure = true;
    }
    if args.no_clean {
        config.clean_diffs = false;
    }
    config
}

/// Browser launch options from the run flags
#[must_use]
pub fn browser_options(args: &RunArgs) -> BrowserOptions {
    let mut options = BrowserOptions::default().with_headless(!args.headed);
    if let Some(path) = &args.chromium_path {
        options = options.with_chromium_path(path.clone());
    }
    if args.no_sandbox {
        options = options.with_no_sandbox();
    }
    options
}

/// Execute the run command; returns `true` when the run succeeded under the
/// configured exit policy
pub fn execute_run(cli: &CliConfig, args: &RunArgs) -> CliResult<bool> {
    let config = apply_overrides(resolve_config(args.config.as_deref())?, args);
    config.validate()?;
    runtime()?.block_on(run_pipeline(cli, args, config))
}

async fn run_pipeline(
    cli: &CliConfig,
    args: &RunArgs,
    config: VisualRegressionConfig,
) -> CliResult<bool> {
    let started = Instant::now();
    let mut reporter = ProgressReporter::new(cli.color.should_color(), cli.verbosity.is_quiet());
    reporter.header("Visual Regression");
    reporter.info(&format!(
        "{} vs {}",
        config.local_origin, config.production_origin
    ));

    let capture = Arc::new(
        ChromiumCapture::launch(browser_options(args), CaptureSettings::from_config(&config))
            .await?,
    );
    let runner = VisualRegressionRunner::new(
        config.clone(),
        Arc::clone(&capture) as Arc<dyn CaptureAdapter>,
    );

    reporter.start_progress(runner.combinations().len() as u64, "Comparing");
    let hook = reporter.clone();
    let runner = runner.with_progress(Arc::new(move |result: &ComparisonResult| {
        hook.record(result);
    }));

    let outcome = runner.run_all().await;
    reporter.finish();
    drop(runner);

    if let Ok(capture) = Arc::try_unwrap(capture) {
        if let Err(e) = capture.close().await {
            tracing::debug!(error = %e, "Failed to close browser");
        }
    }

    let report = outcome?;
    write_report(&report, &config.report_path, config.report_format).await?;

    reporter.summary(&report.summary(), started.elapsed());
    reporter.problems(&report.problems(), cli.verbosity.is_verbose());
    reporter.info(&format!("Report: {}", config.report_path.display()));

    Ok(report.is_success(ExitPolicy::from_config(&config)))
}
