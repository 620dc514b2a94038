//! Comparison results and the consolidated report.
//!
//! A [`Report`] holds one [`ComparisonResult`] per combination in enumeration
//! order. Rendering is pure; [`write_report`] is the only function here that
//! touches the filesystem.

use crate::artifacts::{write_atomic, ArtifactPaths};
use crate::config::{ReportFormat, Viewport, VisualRegressionConfig};
use crate::orchestrator::Combination;
use crate::result::CompararResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Outcome class of one combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComparisonStatus {
    /// Difference at or below the threshold
    Passed,
    /// Difference above the threshold
    Failed,
    /// Production could not be captured; the local screenshot was kept
    Degraded,
    /// The combination could not be compared
    Errored,
}

impl ComparisonStatus {
    /// Uppercase label used in reports
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Degraded => "DEGRADED",
            Self::Errored => "ERRORED",
        }
    }

    /// CSS class suffix
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Degraded => "degraded",
            Self::Errored => "errored",
        }
    }
}

impl std::fmt::Display for ComparisonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of comparing one (route, viewport, browser) combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Route path
    pub route: String,
    /// Viewport
    pub viewport: Viewport,
    /// Browser name
    pub browser: String,
    /// Pixels counted as different
    pub num_diff_pixels: Option<u64>,
    /// Pixels in the compared images
    pub total_pixels: Option<u64>,
    /// `num_diff_pixels / total_pixels`, in `[0, 1]`
    pub diff_percentage: Option<f64>,
    /// Threshold the percentage was judged against
    pub threshold: f64,
    /// `diff_percentage > threshold`
    pub is_different: bool,
    /// Outcome class
    pub status: ComparisonStatus,
    /// Local screenshot, when captured
    pub local_path: Option<PathBuf>,
    /// Production screenshot, when captured
    pub production_path: Option<PathBuf>,
    /// Diff image, only when different
    pub diff_path: Option<PathBuf>,
    /// Size of the encoded diff image
    pub diff_bytes: Option<u64>,
    /// Reason for a degraded or errored result
    pub error: Option<String>,
    /// Wall time spent on the combination
    pub duration_ms: u64,
}

impl ComparisonResult {
    /// A combination that was captured on both sides and compared
    #[must_use]
    pub fn compared(
        combination: &Combination,
        threshold: f64,
        num_diff_pixels: u64,
        total_pixels: u64,
        paths: &ArtifactPaths,
    ) -> Self {
        let diff_percentage = if total_pixels == 0 {
            0.0
        } else {
            num_diff_pixels as f64 / total_pixels as f64
        };
        let is_different = diff_percentage > threshold;
        Self {
            num_diff_pixels: Some(num_diff_pixels),
            total_pixels: Some(total_pixels),
            diff_percentage: Some(diff_percentage),
            is_different,
            status: if is_different {
                ComparisonStatus::Failed
            } else {
                ComparisonStatus::Passed
            },
            local_path: Some(paths.local.clone()),
            production_path: Some(paths.production.clone()),
            diff_path: is_different.then(|| paths.diff.clone()),
            ..Self::empty(combination, threshold, ComparisonStatus::Passed)
        }
    }

    /// Production was unreachable; only the local screenshot exists
    #[must_use]
    pub fn degraded(
        combination: &Combination,
        threshold: f64,
        local_path: impl Into<PathBuf>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            local_path: Some(local_path.into()),
            error: Some(error.into()),
            ..Self::empty(combination, threshold, ComparisonStatus::Degraded)
        }
    }

    /// The combination could not be compared
    #[must_use]
    pub fn errored(combination: &Combination, threshold: f64, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::empty(combination, threshold, ComparisonStatus::Errored)
        }
    }

    fn empty(combination: &Combination, threshold: f64, status: ComparisonStatus) -> Self {
        Self {
            route: combination.route.clone(),
            viewport: combination.viewport.clone(),
            browser: combination.browser.clone(),
            num_diff_pixels: None,
            total_pixels: None,
            diff_percentage: None,
            threshold,
            is_different: false,
            status,
            local_path: None,
            production_path: None,
            diff_path: None,
            diff_bytes: None,
            error: None,
            duration_ms: 0,
        }
    }

    /// Record screenshots that exist for an errored combination
    #[must_use]
    pub fn with_artifacts(mut self, local: Option<PathBuf>, production: Option<PathBuf>) -> Self {
        self.local_path = local;
        self.production_path = production;
        self
    }

    /// Record the encoded diff size
    #[must_use]
    pub const fn with_diff_bytes(mut self, bytes: u64) -> Self {
        self.diff_bytes = Some(bytes);
        self
    }

    /// Record elapsed time
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// `route - viewport` heading
    #[must_use]
    pub fn title(&self) -> String {
        format!("{} - {}", self.route, self.viewport.name)
    }
}

/// Aggregate counts over a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// All combinations
    pub total: usize,
    /// Passed
    pub passed: usize,
    /// Failed
    pub failed: usize,
    /// Degraded
    pub degraded: usize,
    /// Errored
    pub errored: usize,
    /// Mean of the entries that have a diff percentage
    pub mean_diff_percentage: Option<f64>,
}

/// Which outcomes make a run unsuccessful
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitPolicy {
    /// Fail the run when production was unreachable for some combination
    pub degraded_is_failure: bool,
}

impl ExitPolicy {
    /// Policy taken from a run configuration
    #[must_use]
    pub const fn from_config(config: &VisualRegressionConfig) -> Self {
        Self {
            degraded_is_failure: config.degraded_is_failure,
        }
    }
}

/// Consolidated results of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// When the report was built
    pub generated_at: DateTime<Utc>,
    /// One entry per combination, in enumeration order
    pub results: Vec<ComparisonResult>,
}

impl Report {
    /// Build a report stamped with the current time
    #[must_use]
    pub fn new(results: Vec<ComparisonResult>) -> Self {
        Self {
            generated_at: Utc::now(),
            results,
        }
    }

    /// Count outcomes and average the valid diff percentages
    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        let count = |status: ComparisonStatus| self.results.iter().filter(|r| r.status == status).count();
        let percentages: Vec<f64> = self
            .results
            .iter()
            .filter_map(|r| r.diff_percentage)
            .collect();
        let mean_diff_percentage = if percentages.is_empty() {
            None
        } else {
            Some(percentages.iter().sum::<f64>() / percentages.len() as f64)
        };

        ReportSummary {
            total: self.results.len(),
            passed: count(ComparisonStatus::Passed),
            failed: count(ComparisonStatus::Failed),
            degraded: count(ComparisonStatus::Degraded),
            errored: count(ComparisonStatus::Errored),
            mean_diff_percentage,
        }
    }

    /// Whether the run should exit successfully under `policy`
    #[must_use]
    pub fn is_success(&self, policy: ExitPolicy) -> bool {
        self.results.iter().all(|r| match r.status {
            ComparisonStatus::Passed => true,
            ComparisonStatus::Degraded => !policy.degraded_is_failure,
            ComparisonStatus::Failed | ComparisonStatus::Errored => false,
        })
    }

    /// Entries that did not pass
    #[must_use]
    pub fn problems(&self) -> Vec<&ComparisonResult> {
        self.results
            .iter()
            .filter(|r| r.status != ComparisonStatus::Passed)
            .collect()
    }
}

/// Format a fraction as a percentage with two decimals
#[must_use]
pub fn format_percentage(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

/// Human readable byte count: `1.50 KB`
#[must_use]
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.2} {}", UNITS[unit])
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// `target` expressed relative to the directory `base`, with `/` separators.
///
/// Relative inputs are resolved against the current directory first, so the
/// two paths may mix absolute and relative forms or contain `..`.
#[must_use]
pub fn relative_path(target: &Path, base: &Path) -> String {
    let cwd = std::env::current_dir().unwrap_or_default();
    relative_path_from(target, base, &cwd)
}

fn relative_path_from(target: &Path, base: &Path, cwd: &Path) -> String {
    let target = resolve(target, cwd);
    let base = resolve(base, cwd);
    let target_parts: Vec<Component<'_>> = target.components().collect();
    let base_parts: Vec<Component<'_>> = base.components().collect();
    let common = target_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();

    // Different roots (e.g. another drive) have no relative form.
    if common == 0 && target.has_root() {
        return target.to_string_lossy().replace('\\', "/");
    }

    let mut parts: Vec<String> = vec!["..".to_string(); base_parts.len() - common];
    parts.extend(
        target_parts[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

/// Absolute form of `path` with `.` and `..` folded away lexically
fn resolve(path: &Path, cwd: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

const STYLE: &str = r#"    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 20px; background: #f5f5f5; }
        .container { max-width: 1200px; margin: 0 auto; background: white; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); overflow: hidden; }
        .header { background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; padding: 20px; text-align: center; }
        .summary { display: grid; grid-template-columns: repeat(auto-fit, minmax(150px, 1fr)); gap: 20px; padding: 20px; background: #f8f9fa; border-bottom: 1px solid #dee2e6; }
        .summary-item { text-align: center; }
        .summary-value { font-size: 2em; font-weight: bold; color: #495057; }
        .summary-label { color: #6c757d; margin-top: 5px; }
        .results { padding: 20px; }
        .test-case { border: 1px solid #dee2e6; border-radius: 8px; margin-bottom: 20px; overflow: hidden; }
        .test-header { background: #f8f9fa; padding: 15px; border-bottom: 1px solid #dee2e6; }
        .test-title { margin: 0; font-size: 1.1em; color: #495057; }
        .test-meta { color: #6c757d; font-size: 0.9em; margin-top: 5px; }
        .test-status { display: inline-block; padding: 4px 8px; border-radius: 4px; font-size: 0.8em; font-weight: bold; }
        .status-passed { background: #d4edda; color: #155724; }
        .status-failed { background: #f8d7da; color: #721c24; }
        .status-degraded { background: #fff3cd; color: #856404; }
        .status-errored { background: #e2e3e5; color: #383d41; }
        .error { padding: 15px; color: #721c24; font-family: monospace; }
        .comparison { display: grid; grid-template-columns: 1fr 1fr 1fr; gap: 10px; padding: 15px; }
        .comparison img { width: 100%; height: auto; border: 1px solid #dee2e6; border-radius: 4px; }
        .comparison-label { text-align: center; font-size: 0.9em; color: #6c757d; margin-top: 5px; }
        .metrics { display: grid; grid-template-columns: repeat(auto-fit, minmax(150px, 1fr)); gap: 10px; padding: 15px; background: #f8f9fa; border-top: 1px solid #dee2e6; }
        .metric { text-align: center; }
        .metric-value { font-weight: bold; color: #495057; }
        .metric-label { font-size: 0.8em; color: #6c757d; }
    </style>
"#;

fn summary_item(html: &mut String, value: &str, label: &str) {
    html.push_str(&format!(
        "            <div class=\"summary-item\"><div class=\"summary-value\">{value}</div><div class=\"summary-label\">{label}</div></div>\n"
    ));
}

fn metric(html: &mut String, value: &str, label: &str) {
    html.push_str(&format!(
        "                <div class=\"metric\"><div class=\"metric-value\">{value}</div><div class=\"metric-label\">{label}</div></div>\n"
    ));
}

fn image_cell(html: &mut String, path: Option<&Path>, report_dir: &Path, label: &str) {
    if let Some(path) = path {
        html.push_str(&format!(
            "                <div><img src=\"{}\" alt=\"{label}\"><div class=\"comparison-label\">{label}</div></div>\n",
            escape_html(&relative_path(path, report_dir))
        ));
    }
}

/// Render a standalone HTML page; image paths are relative to `report_dir`
#[must_use]
pub fn render_html(report: &Report, report_dir: &Path) -> String {
    let summary = report.summary();
    let dash = || "-".to_string();
    let mut html = String::new();

    html.push_str(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n    <meta charset=\"UTF-8\">\n    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n    <title>Visual Regression Test Report</title>\n",
    );
    html.push_str(STYLE);
    html.push_str("</head>\n<body>\n<div class=\"container\">\n");
    html.push_str(&format!(
        "    <div class=\"header\">\n        <h1>Visual Regression Test Report</h1>\n        <p>Generated on {}</p>\n    </div>\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    html.push_str("    <div class=\"summary\">\n");
    summary_item(&mut html, &summary.total.to_string(), "Total Tests");
    summary_item(&mut html, &summary.passed.to_string(), "Passed");
    summary_item(&mut html, &summary.failed.to_string(), "Failed");
    summary_item(&mut html, &summary.degraded.to_string(), "Degraded");
    summary_item(&mut html, &summary.errored.to_string(), "Errored");
    summary_item(
        &mut html,
        &summary.mean_diff_percentage.map_or_else(dash, format_percentage),
        "Avg Difference",
    );
    html.push_str("    </div>\n");

    html.push_str("    <div class=\"results\">\n");
    for result in &report.results {
        let percentage = result.diff_percentage.map_or_else(dash, format_percentage);
        let diff_pixels = result.num_diff_pixels.map_or_else(dash, |n| n.to_string());
        let total_pixels = result.total_pixels.map_or_else(dash, |n| n.to_string());

        html.push_str("        <div class=\"test-case\">\n");
        html.push_str(&format!(
            "            <div class=\"test-header\">\n                <h3 class=\"test-title\">{}</h3>\n                <div class=\"test-meta\">Viewport: {} | Browser: {} | Diff: {} | Pixels: {}</div>\n                <span class=\"test-status status-{}\">{}</span>\n            </div>\n",
            escape_html(&result.title()),
            escape_html(&result.viewport.to_string()),
            escape_html(&result.browser),
            percentage,
            diff_pixels,
            result.status.css_class(),
            result.status.label(),
        ));

        if let Some(error) = &result.error {
            html.push_str(&format!(
                "            <div class=\"error\">{}</div>\n",
                escape_html(error)
            ));
        }

        if result.is_different {
            html.push_str("            <div class=\"comparison\">\n");
            image_cell(&mut html, result.local_path.as_deref(), report_dir, "Local");
            image_cell(
                &mut html,
                result.production_path.as_deref(),
                report_dir,
                "Production",
            );
            image_cell(&mut html, result.diff_path.as_deref(), report_dir, "Difference");
            html.push_str("            </div>\n");
        }

        html.push_str("            <div class=\"metrics\">\n");
        metric(&mut html, &percentage, "Difference");
        metric(&mut html, &diff_pixels, "Diff Pixels");
        metric(&mut html, &total_pixels, "Total Pixels");
        metric(&mut html, &format_percentage(result.threshold), "Threshold");
        html.push_str("            </div>\n        </div>\n");
    }
    html.push_str("    </div>\n</div>\n</body>\n</html>\n");
    html
}

/// Render the report as pretty JSON, summary included
///
/// # Errors
///
/// Returns error if serialization fails
pub fn render_json(report: &Report) -> CompararResult<String> {
    #[derive(Serialize)]
    struct JsonReport<'a> {
        generated_at: &'a DateTime<Utc>,
        summary: ReportSummary,
        results: &'a [ComparisonResult],
    }

    Ok(serde_json::to_string_pretty(&JsonReport {
        generated_at: &report.generated_at,
        summary: report.summary(),
        results: &report.results,
    })?)
}

/// Render a plain text table for terminals and CI logs
#[must_use]
pub fn render_text(report: &Report) -> String {
    let summary = report.summary();
    let mut out = format!(
        "Visual Regression Report ({})\n\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    for r in &report.results {
        let diff = r
            .diff_percentage
            .map_or_else(|| "-".to_string(), format_percentage);
        out.push_str(&format!(
            "  {:<8}  {:<20} {:<20} {:<10} {:>8}",
            r.status.label(),
            r.route,
            r.viewport.to_string(),
            r.browser,
            diff
        ));
        if let (Some(path), Some(bytes)) = (&r.diff_path, r.diff_bytes) {
            out.push_str(&format!(
                "  diff: {} ({})",
                path.display(),
                format_file_size(bytes)
            ));
        }
        if let Some(error) = &r.error {
            out.push_str(&format!("  {error}"));
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "\nTotal: {}  Passed: {}  Failed: {}  Degraded: {}  Errored: {}  Avg difference: {}\n",
        summary.total,
        summary.passed,
        summary.failed,
        summary.degraded,
        summary.errored,
        summary
            .mean_diff_percentage
            .map_or_else(|| "-".to_string(), format_percentage)
    ));
    out
}

/// Render in `format` and write to `path`, creating the parent directory
///
/// # Errors
///
/// Returns error if rendering or writing fails
pub async fn write_report(report: &Report, path: &Path, format: ReportFormat) -> CompararResult<()> {
    let content = match format {
        ReportFormat::Html => {
            let dir = path.parent().unwrap_or_else(|| Path::new(""));
            render_html(report, dir)
        }
        ReportFormat::Json => render_json(report)?,
        ReportFormat::Text => render_text(report),
    };
    write_atomic(path, content.as_bytes()).await?;
    tracing::info!(path = %path.display(), "Visual regression report generated");
    Ok(())
}
