//! Output formatting and progress reporting

use comparar::{format_percentage, ComparisonResult, ComparisonStatus, ReportSummary};
use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter for a comparison run.
///
/// Cheap to clone; clones share the same progress bar, so one can be moved
/// into the runner's progress hook while the caller keeps its own handle for the summary.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a progress bar over `total` combinations
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Increment progress
    pub fn increment(&self, delta: u64) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(delta);
        }
    }

    /// Finish progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_and_clear();
        }
    }

    fn write_line(&self, line: &str) {
        match &self.progress_bar {
            Some(pb) if !pb.is_finished() => pb.println(line),
            _ => {
                let _ = self.term.write_line(line);
            }
        }
    }

    fn prefixed(&self, symbol: &str, plain: &str, color: Style, message: &str) -> String {
        let prefix = if self.use_color {
            color.bold().apply_to(symbol).to_string()
        } else {
            plain.to_string()
        };
        format!("{prefix} {message}")
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.write_line(&self.prefixed("✓", "PASS", Style::new().green(), message));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        self.write_line(&self.prefixed("✗", "FAIL", Style::new().red(), message));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.write_line(&self.prefixed("⚠", "WARN", Style::new().yellow(), message));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.write_line(&self.prefixed("ℹ", "INFO", Style::new().blue(), message));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        let _ = self.term.write_line("");
        let _ = self.term.write_line(&styled);
    }

    /// Print one line for a finished combination and advance the bar
    pub fn record(&self, result: &ComparisonResult) {
        let line = result_line(result);
        match result.status {
            ComparisonStatus::Passed => self.success(&line),
            ComparisonStatus::Failed | ComparisonStatus::Errored => self.failure(&line),
            ComparisonStatus::Degraded => self.warning(&line),
        }
        self.increment(1);
    }

    /// Print the run summary
    pub fn summary(&self, summary: &ReportSummary, duration: Duration) {
        let problems = summary.failed + summary.errored;
        if self.quiet && problems == 0 {
            return;
        }

        let _ = self.term.write_line("");
        let average = summary
            .mean_diff_percentage
            .map_or_else(|| "-".to_string(), format_percentage);
        let duration_secs = duration.as_secs_f64();

        if self.use_color {
            let passed_style = Style::new().green().bold();
            let failed_style = Style::new().red().bold();
            let degraded_style = Style::new().yellow();

            let status = if problems > 0 {
                failed_style.apply_to("FAILED")
            } else {
                passed_style.apply_to("PASSED")
            };

            let _ = self.term.write_line(&format!(
                "{} {} comparisons in {:.2}s ({} passed, {} failed, {} degraded, {} errored, avg difference {})",
                status,
                summary.total,
                duration_secs,
                passed_style.apply_to(summary.passed),
                failed_style.apply_to(summary.failed),
                degraded_style.apply_to(summary.degraded),
                failed_style.apply_to(summary.errored),
                average
            ));
        } else {
            let status = if problems > 0 { "FAILED" } else { "PASSED" };
            let _ = self.term.write_line(&format!(
                "{status} {} comparisons in {duration_secs:.2}s ({} passed, {} failed, {} degraded, {} errored, avg difference {average})",
                summary.total, summary.passed, summary.failed, summary.degraded, summary.errored
            ));
        }
    }

    /// Recap the entries that did not pass after the progress output
    pub fn problems(&self, problems: &[&ComparisonResult], detailed: bool) {
        if self.quiet || problems.is_empty() {
            return;
        }
        let _ = self.term.write_line("");
        let _ = self.term.write_line(&format!("Problems ({}):", problems.len()));
        for line in problem_lines(problems, detailed) {
            let _ = self.term.write_line(&line);
        }
    }
}

/// Recap lines for entries that did not pass; `detailed` adds their artifact
/// paths
#[must_use]
pub fn problem_lines(problems: &[&ComparisonResult], detailed: bool) -> Vec<String> {
    let mut lines = Vec::new();
    for result in problems {
        lines.push(format!("  {} {}", result.status.label(), result_line(result)));
        if !detailed {
            continue;
        }
        for (label, path) in [
            ("local", &result.local_path),
            ("production", &result.production_path),
            ("diff", &result.diff_path),
        ] {
            if let Some(path) = path {
                lines.push(format!("      {label}: {}", path.display()));
            }
        }
    }
    lines
}

/// One-line description of a finished combination
#[must_use]
pub fn result_line(result: &ComparisonResult) -> String {
    let subject = format!(
        "{} ({}, {})",
        result.route, result.viewport.name, result.browser
    );
    match result.status {
        ComparisonStatus::Passed => format!(
            "{subject}: {} difference",
            result
                .diff_percentage
                .map_or_else(|| "-".to_string(), format_percentage)
        ),
        ComparisonStatus::Failed => {
            let mut line = format!(
                "{subject}: {} difference exceeds {} threshold",
                result
                    .diff_percentage
                    .map_or_else(|| "-".to_string(), format_percentage),
                format_percentage(result.threshold)
            );
            if let Some(path) = &result.diff_path {
                line.push_str(&format!(" (diff: {})", path.display()));
            }
            line
        }
        ComparisonStatus::Degraded | ComparisonStatus::Errored => format!(
            "{subject}: {}",
            result.error.as_deref().unwrap_or("no details")
        ),
    }
}
