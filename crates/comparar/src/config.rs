//! Visual regression run configuration.
//!
//! Loaded from YAML or JSON (chosen by file extension); every field has a
//! default so a config file only needs to name what it changes.

use crate::orchestrator::{ensure_distinct_names, Combination};
use crate::pixelmatch::CompareOptions;
use crate::result::{CompararError, CompararResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default fraction of differing pixels tolerated per combination
pub const DEFAULT_THRESHOLD: f64 = 0.05;

/// Default per-pixel colour distance threshold
pub const DEFAULT_PER_PIXEL_THRESHOLD: f64 = 0.1;

/// Default settle delay after network quiescence
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2_000;

/// Default quiet window that counts as network idle
pub const DEFAULT_NETWORK_IDLE_MS: u64 = 500;

/// Default budget for a single capture
pub const DEFAULT_CAPTURE_TIMEOUT_MS: u64 = 30_000;

/// Default number of combinations in flight
pub const DEFAULT_CONCURRENCY: usize = 2;

/// A named browser viewport
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    /// Name used in artifact file names and reports
    pub name: String,
    /// Width in CSS pixels
    pub width: u32,
    /// Height in CSS pixels
    pub height: u32,
}

impl Viewport {
    /// Create a viewport
    #[must_use]
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
        }
    }

    /// Mobile preset (390x844)
    #[must_use]
    pub fn mobile() -> Self {
        Self::new("mobile", 390, 844)
    }

    /// Desktop preset (1440x900)
    #[must_use]
    pub fn desktop() -> Self {
        Self::new("desktop", 1440, 900)
    }

    /// Parse `name=WIDTHxHEIGHT`
    ///
    /// # Errors
    ///
    /// Returns error if the spec is malformed
    pub fn parse(spec: &str) -> CompararResult<Self> {
        let invalid = || {
            CompararError::config(format!(
                "Invalid viewport '{spec}', expected name=WIDTHxHEIGHT"
            ))
        };
        let (name, size) = spec.split_once('=').ok_or_else(invalid)?;
        let (w, h) = size
            .split_once(['x', 'X'])
            .ok_or_else(invalid)?;
        let width = w.trim().parse().map_err(|_| invalid())?;
        let height = h.trim().parse().map_err(|_| invalid())?;
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(name, width, height))
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}x{})", self.name, self.width, self.height)
    }
}

/// Where screenshots and diffs are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactLayout {
    /// Local screenshots
    pub screenshots_dir: PathBuf,
    /// Production screenshots
    pub production_dir: PathBuf,
    /// Diff images
    pub diff_dir: PathBuf,
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self {
            screenshots_dir: PathBuf::from("tests/__screenshots__"),
            production_dir: PathBuf::from("tests/__production__"),
            diff_dir: PathBuf::from("tests/__diff__"),
        }
    }
}

impl ArtifactLayout {
    /// Place all three directories under `root`
    #[must_use]
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            screenshots_dir: root.join("__screenshots__"),
            production_dir: root.join("__production__"),
            diff_dir: root.join("__diff__"),
        }
    }
}

/// Rendered report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Standalone HTML page with side-by-side images
    #[default]
    Html,
    /// Machine-readable JSON
    Json,
    /// Plain text summary
    Text,
}

/// Configuration for a visual regression run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualRegressionConfig {
    /// Route paths to test, e.g. `/` or `/contact`
    pub routes: Vec<String>,
    /// Viewports to test each route at
    pub viewports: Vec<Viewport>,
    /// Browser names passed to the capture adapter
    pub browsers: Vec<String>,
    /// Fraction of pixels (0.0-1.0) allowed to differ before a combination fails
    pub threshold: f64,
    /// Per-pixel colour distance threshold (0.0-1.0)
    pub per_pixel_threshold: f64,
    /// Count anti-aliased pixels as differences
    pub include_anti_aliasing: bool,
    /// Opacity of the original image in diff artifacts
    pub alpha: f64,
    /// Origin serving the local build
    pub local_origin: String,
    /// Origin serving production
    pub production_origin: String,
    /// Fixed wait after network quiescence
    pub settle_delay_ms: u64,
    /// Quiet window that counts as network idle
    pub network_idle_ms: u64,
    /// Budget for a single capture
    pub capture_timeout_ms: u64,
    /// Combinations in flight at once
    pub concurrency: usize,
    /// Artifact directories
    pub artifacts: ArtifactLayout,
    /// Rendered report location
    pub report_path: PathBuf,
    /// Rendered report format
    pub report_format: ReportFormat,
    /// Treat unreachable production as a failure for the exit code
    pub degraded_is_failure: bool,
    /// Remove stale diff images before running
    pub clean_diffs: bool,
}

impl Default for VisualRegressionConfig {
    fn default() -> Self {
        Self {
            routes: vec!["/".to_string(), "/contact".to_string()],
            viewports: vec![Viewport::mobile(), Viewport::desktop()],
            browsers: vec!["chromium".to_string()],
            threshold: DEFAULT_THRESHOLD,
            per_pixel_threshold: DEFAULT_PER_PIXEL_THRESHOLD,
            include_anti_aliasing: false,
            alpha: 0.1,
            local_origin: "http://localhost:4321".to_string(),
            production_origin: "https://www.example.com".to_string(),
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            network_idle_ms: DEFAULT_NETWORK_IDLE_MS,
            capture_timeout_ms: DEFAULT_CAPTURE_TIMEOUT_MS,
            concurrency: DEFAULT_CONCURRENCY,
            artifacts: ArtifactLayout::default(),
            report_path: PathBuf::from("tests/__diff__/report.html"),
            report_format: ReportFormat::Html,
            degraded_is_failure: false,
            clean_diffs: true,
        }
    }
}

impl VisualRegressionConfig {
    /// Create default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a `.yaml`/`.yml` or `.json` file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> CompararResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            Some("yaml" | "yml") | None => Self::from_yaml(&content),
            Some(other) => Err(CompararError::config(format!(
                "Unsupported config extension '.{other}' for {}",
                path.display()
            ))),
        }
    }

    /// Parse YAML
    ///
    /// # Errors
    ///
    /// Returns error if the YAML is invalid
    pub fn from_yaml(content: &str) -> CompararResult<Self> {
        Ok(serde_yaml_ng::from_str(content)?)
    }

    /// Parse JSON
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is invalid
    pub fn from_json(content: &str) -> CompararResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Serialize to YAML
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> CompararResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Set routes
    #[must_use]
    pub fn with_routes<I, S>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routes = routes.into_iter().map(Into::into).collect();
        self
    }

    /// Set viewports
    #[must_use]
    pub fn with_viewports(mut self, viewports: Vec<Viewport>) -> Self {
        self.viewports = viewports;
        self
    }

    /// Set browsers
    #[must_use]
    pub fn with_browsers<I, S>(mut self, browsers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.browsers = browsers.into_iter().map(Into::into).collect();
        self
    }

    /// Set the pass/fail threshold
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the per-pixel threshold
    #[must_use]
    pub const fn with_per_pixel_threshold(mut self, threshold: f64) -> Self {
        self.per_pixel_threshold = threshold;
        self
    }

    /// Set the local origin
    #[must_use]
    pub fn with_local_origin(mut self, origin: impl Into<String>) -> Self {
        self.local_origin = origin.into();
        self
    }

    /// Set the production origin
    #[must_use]
    pub fn with_production_origin(mut self, origin: impl Into<String>) -> Self {
        self.production_origin = origin.into();
        self
    }

    /// Set the settle delay
    #[must_use]
    pub const fn with_settle_delay_ms(mut self, ms: u64) -> Self {
        self.settle_delay_ms = ms;
        self
    }

    /// Set the capture timeout
    #[must_use]
    pub const fn with_capture_timeout_ms(mut self, ms: u64) -> Self {
        self.capture_timeout_ms = ms;
        self
    }

    /// Set concurrency
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set artifact directories
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: ArtifactLayout) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Set the report path
    #[must_use]
    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = path.into();
        self
    }

    /// Set the report format
    #[must_use]
    pub const fn with_report_format(mut self, format: ReportFormat) -> Self {
        self.report_format = format;
        self
    }

    /// Treat degraded combinations as failures
    #[must_use]
    pub const fn with_degraded_is_failure(mut self, fail: bool) -> Self {
        self.degraded_is_failure = fail;
        self
    }

    /// Enable or disable stale diff cleanup
    #[must_use]
    pub const fn with_clean_diffs(mut self, clean: bool) -> Self {
        self.clean_diffs = clean;
        self
    }

    /// Comparator options derived from this configuration
    #[must_use]
    pub fn compare_options(&self) -> CompareOptions {
        CompareOptions::default()
            .with_per_pixel_threshold(self.per_pixel_threshold)
            .with_include_anti_aliasing(self.include_anti_aliasing)
            .with_alpha(self.alpha)
    }

    /// Capture timeout as a Duration
    #[must_use]
    pub const fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    /// Check the configuration for values the pipeline cannot run with
    ///
    /// # Errors
    ///
    /// Returns the first problem found
    pub fn validate(&self) -> CompararResult<()> {
        if self.routes.is_empty() {
            return Err(CompararError::config("at least one route is required"));
        }
        if let Some(route) = self.routes.iter().find(|r| !r.starts_with('/')) {
            return Err(CompararError::config(format!(
                "route '{route}' must start with '/'"
            )));
        }
        if self.viewports.is_empty() {
            return Err(CompararError::config("at least one viewport is required"));
        }
        if let Some(vp) = self.viewports.iter().find(|v| v.width == 0 || v.height == 0) {
            return Err(CompararError::config(format!(
                "viewport '{}' must have a non-zero size",
                vp.name
            )));
        }
        if self.browsers.is_empty() {
            return Err(CompararError::config("at least one browser is required"));
        }
        for (name, value) in [
            ("threshold", self.threshold),
            ("per_pixel_threshold", self.per_pixel_threshold),
            ("alpha", self.alpha),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CompararError::config(format!(
                    "{name} must be between 0 and 1, got {value}"
                )));
            }
        }
        if self.concurrency == 0 {
            return Err(CompararError::config("concurrency must be at least 1"));
        }
        if self.capture_timeout_ms == 0 {
            return Err(CompararError::config("capture_timeout_ms must be positive"));
        }
        for (name, origin) in [
            ("local_origin", &self.local_origin),
            ("production_origin", &self.production_origin),
        ] {
            if !(origin.starts_with("http://") || origin.starts_with("https://")) {
                return Err(CompararError::config(format!(
                    "{name} must be an http(s) URL, got '{origin}'"
                )));
            }
        }
        ensure_distinct_names(&Combination::enumerate(
            &self.routes,
            &self.viewports,
            &self.browsers,
        ))
    }
}

/// Join an origin and a route without doubling the slash
#[must_use]
pub fn join_url(origin: &str, route: &str) -> String {
    format!(
        "{}/{}",
        origin.trim_end_matches('/'),
        route.trim_start_matches('/')
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod viewport_tests {
        use super::*;

        #[test]
        fn test_presets() {
            assert_eq!(Viewport::mobile(), Viewport::new("mobile", 390, 844));
            assert_eq!(Viewport::desktop(), Viewport::new("desktop", 1440, 900));
        }

        #[test]
        fn test_parse() {
            let vp = Viewport::parse("tablet=768x1024").unwrap();
            assert_eq!(vp, Viewport::new("tablet", 768, 1024));
        }

        #[test]
        fn test_parse_uppercase_separator() {
            assert_eq!(Viewport::parse("wide=1920X1080").unwrap().width, 1920);
        }

        #[test]
        fn test_parse_invalid() {
            assert!(Viewport::parse("tablet").is_err());
            assert!(Viewport::parse("tablet=768").is_err());
            assert!(Viewport::parse("=768x1024").is_err());
            assert!(Viewport::parse("tablet=axb").is_err());
        }

        #[test]
        fn test_display() {
            assert_eq!(Viewport::mobile().to_string(), "mobile (390x844)");
        }
    }

    mod config_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = VisualRegressionConfig::default();
            assert_eq!(config.routes, vec!["/", "/contact"]);
            assert_eq!(config.viewports.len(), 2);
            assert_eq!(config.browsers, vec!["chromium"]);
            assert!((config.threshold - 0.05).abs() < f64::EPSILON);
            assert!((config.per_pixel_threshold - 0.1).abs() < f64::EPSILON);
            assert_eq!(config.settle_delay_ms, 2_000);
            assert_eq!(config.capture_timeout_ms, 30_000);
            assert_eq!(config.concurrency, 2);
            assert!(!config.degraded_is_failure);
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_builder() {
            let config = VisualRegressionConfig::new()
                .with_routes(["/about"])
                .with_viewports(vec![Viewport::mobile()])
                .with_browsers(["chromium", "chrome"])
                .with_threshold(0.005)
                .with_concurrency(4)
                .with_degraded_is_failure(true);
            assert_eq!(config.routes, vec!["/about"]);
            assert_eq!(config.browsers.len(), 2);
            assert!((config.threshold - 0.005).abs() < f64::EPSILON);
            assert_eq!(config.concurrency, 4);
            assert!(config.degraded_is_failure);
        }

        #[test]
        fn test_compare_options() {
            let config = VisualRegressionConfig::new().with_per_pixel_threshold(0.2);
            let opts = config.compare_options();
            assert!((opts.per_pixel_threshold - 0.2).abs() < f64::EPSILON);
            assert!(!opts.include_anti_aliasing);
        }

        #[test]
        fn test_partial_yaml_uses_defaults() {
            let yaml = "routes: ['/pricing']\nthreshold: 0.01\nproduction_origin: https://www.jadenx.com\n";
            let config = VisualRegressionConfig::from_yaml(yaml).unwrap();
            assert_eq!(config.routes, vec!["/pricing"]);
            assert!((config.threshold - 0.01).abs() < f64::EPSILON);
            assert_eq!(config.production_origin, "https://www.jadenx.com");
            assert_eq!(config.viewports.len(), 2);
            assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        }

        #[test]
        fn test_json_with_viewports() {
            let json = r#"{"viewports": [{"name": "tiny", "width": 320, "height": 480}], "report_format": "json"}"#;
            let config = VisualRegressionConfig::from_json(json).unwrap();
            assert_eq!(config.viewports, vec![Viewport::new("tiny", 320, 480)]);
            assert_eq!(config.report_format, ReportFormat::Json);
        }

        #[test]
        fn test_yaml_round_trip() {
            let config = VisualRegressionConfig::default().with_routes(["/", "/blog"]);
            let yaml = config.to_yaml().unwrap();
            assert_eq!(VisualRegressionConfig::from_yaml(&yaml).unwrap(), config);
        }

        #[test]
        fn test_load_by_extension() {
            let dir = tempfile::tempdir().unwrap();
            let yaml_path = dir.path().join("comparar.yaml");
            std::fs::write(&yaml_path, "concurrency: 3\n").unwrap();
            assert_eq!(VisualRegressionConfig::load(&yaml_path).unwrap().concurrency, 3);

            let json_path = dir.path().join("comparar.json");
            std::fs::write(&json_path, r#"{"concurrency": 5}"#).unwrap();
            assert_eq!(VisualRegressionConfig::load(&json_path).unwrap().concurrency, 5);

            let toml_path = dir.path().join("comparar.toml");
            std::fs::write(&toml_path, "concurrency = 5").unwrap();
            assert!(VisualRegressionConfig::load(&toml_path).is_err());
        }

        #[test]
        fn test_artifact_layout_under() {
            let layout = ArtifactLayout::under("/tmp/run");
            assert_eq!(layout.diff_dir, PathBuf::from("/tmp/run/__diff__"));
            assert_eq!(layout.production_dir, PathBuf::from("/tmp/run/__production__"));
        }
    }

    mod validate_tests {
        use super::*;

        fn assert_invalid(config: &VisualRegressionConfig, needle: &str) {
            let err = config.validate().unwrap_err();
            assert!(
                err.to_string().contains(needle),
                "expected '{needle}' in '{err}'"
            );
        }

        #[test]
        fn test_empty_routes() {
            let config = VisualRegressionConfig::new().with_routes(Vec::<String>::new());
            assert_invalid(&config, "route");
        }

        #[test]
        fn test_relative_route() {
            let config = VisualRegressionConfig::new().with_routes(["contact"]);
            assert_invalid(&config, "must start with '/'");
        }

        #[test]
        fn test_zero_viewport() {
            let config =
                VisualRegressionConfig::new().with_viewports(vec![Viewport::new("none", 0, 100)]);
            assert_invalid(&config, "non-zero");
        }

        #[test]
        fn test_threshold_range() {
            assert_invalid(&VisualRegressionConfig::new().with_threshold(1.5), "threshold");
            assert_invalid(
                &VisualRegressionConfig::new().with_per_pixel_threshold(-0.1),
                "per_pixel_threshold",
            );
        }

        #[test]
        fn test_zero_concurrency() {
            assert_invalid(&VisualRegressionConfig::new().with_concurrency(0), "concurrency");
        }

        #[test]
        fn test_origin_scheme() {
            assert_invalid(
                &VisualRegressionConfig::new().with_production_origin("www.example.com"),
                "production_origin",
            );
        }

        #[test]
        fn test_colliding_artifact_names() {
            assert_invalid(
                &VisualRegressionConfig::new().with_routes(["/", "/home"]),
                "home_mobile_chromium",
            );
            assert_invalid(
                &VisualRegressionConfig::new().with_routes(["/a/b", "/a_b"]),
                "a_b_mobile_chromium",
            );
            assert_invalid(
                &VisualRegressionConfig::new().with_routes(["/contact", "/contact"]),
                "contact_mobile_chromium",
            );
            assert_invalid(
                &VisualRegressionConfig::new()
                    .with_viewports(vec![Viewport::mobile(), Viewport::new("mobile", 320, 640)]),
                "home_mobile_chromium",
            );
        }

        #[test]
        fn test_distinct_routes_accepted() {
            let config = VisualRegressionConfig::new().with_routes(["/", "/blog", "/blog/post"]);
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_no_browsers() {
            assert_invalid(
                &VisualRegressionConfig::new().with_browsers(Vec::<String>::new()),
                "browser",
            );
        }
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://www.example.com", "/"), "https://www.example.com/");
        assert_eq!(
            join_url("https://www.example.com/", "/contact"),
            "https://www.example.com/contact"
        );
        assert_eq!(
            join_url("http://localhost:4321", "/blog/post"),
            "http://localhost:4321/blog/post"
        );
    }
}
