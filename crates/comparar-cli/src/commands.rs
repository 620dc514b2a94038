//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use comparar::Viewport;
use std::path::PathBuf;

/// Comparador: visual regression between a local build and production
#[derive(Parser, Debug)]
#[command(name = "comparador")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture every route on both origins and compare the screenshots
    Run(RunArgs),

    /// Compare two PNG files directly
    Diff(DiffArgs),

    /// Write a default configuration file
    Init(InitArgs),

    /// Show the effective configuration
    Config(ConfigArgs),

    /// Delete stale diff images
    Clean(CleanArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Route to test (repeatable, replaces configured routes)
    #[arg(long = "route")]
    pub routes: Vec<String>,

    /// Viewport as name=WIDTHxHEIGHT (repeatable, replaces configured viewports)
    #[arg(long = "viewport", value_parser = parse_viewport)]
    pub viewports: Vec<Viewport>,

    /// Browser name (repeatable, replaces configured browsers)
    #[arg(long = "browser")]
    pub browsers: Vec<String>,

    /// Fraction of differing pixels tolerated (0.0-1.0)
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Per-pixel colour distance threshold (0.0-1.0)
    #[arg(long)]
    pub per_pixel_threshold: Option<f64>,

    /// Count anti-aliased pixels as differences
    #[arg(long)]
    pub include_aa: bool,

    /// Origin serving the local build
    #[arg(long)]
    pub local_origin: Option<String>,

    /// Origin serving production
    #[arg(long)]
    pub production_origin: Option<String>,

    /// Combinations in flight at once
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Wait after network idle, in milliseconds
    #[arg(long)]
    pub settle_delay_ms: Option<u64>,

    /// Budget for a single capture, in milliseconds
    #[arg(long)]
    pub capture_timeout_ms: Option<u64>,

    /// Report output path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum)]
    pub format: Option<ReportFormatArg>,

    /// Fail the run when production is unreachable
    #[arg(long)]
    pub degraded_is_failure: bool,

    /// Keep diff images from earlier runs
    #[arg(long)]
    pub no_clean: bool,

    /// Path to the Chromium executable
    #[arg(long, env = "CHROMIUM_PATH")]
    pub chromium_path: Option<String>,

    /// Disable the Chromium sandbox (containers, CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,
}

/// Arguments for the diff command
#[derive(Parser, Debug)]
pub struct DiffArgs {
    /// First image (e.g. the local screenshot)
    pub left: PathBuf,

    /// Second image (e.g. the production screenshot)
    pub right: PathBuf,

    /// Write the diff image here
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Fraction of differing pixels tolerated (0.0-1.0)
    #[arg(short, long, default_value = "0.05")]
    pub threshold: f64,

    /// Per-pixel colour distance threshold (0.0-1.0)
    #[arg(long, default_value = "0.1")]
    pub per_pixel_threshold: f64,

    /// Count anti-aliased pixels as differences
    #[arg(long)]
    pub include_aa: bool,
}

/// Arguments for the init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Configuration file to create
    #[arg(short, long, default_value = crate::handlers::DEFAULT_CONFIG_FILE)]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print as JSON instead of YAML
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the clean command
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Report format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormatArg {
    /// Standalone HTML page
    #[default]
    Html,
    /// JSON document
    Json,
    /// Plain text table
    Text,
}

impl From<ReportFormatArg> for comparar::ReportFormat {
    fn from(arg: ReportFormatArg) -> Self {
        match arg {
            ReportFormatArg::Html => Self::Html,
            ReportFormatArg::Json => Self::Json,
            ReportFormatArg::Text => Self::Text,
        }
    }
}

/// Color argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

fn parse_viewport(s: &str) -> Result<Viewport, String> {
    Viewport::parse(s).map_err(|e| e.to_string())
}
