//! Comparador: visual regression from the command line
//!
//! ## Usage
//!
//! ```bash
//! comparador init                           # Write comparar.yaml
//! comparador run                            # Compare every route against production
//! comparador run --route / --threshold 0.01 # Override the configuration
//! comparador diff local.png prod.png -o diff.png
//! comparador clean                          # Delete stale diff images
//! ```

use clap::Parser;
use comparador::{
    handlers, logging, Cli, CliConfig, CliResult, ColorChoice, Commands, ProgressReporter,
    Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Dispatch the subcommand; `Ok(false)` means the comparison found problems
fn run() -> CliResult<bool> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    logging::init_logging(config.verbosity, config.color.should_color());

    match cli.command {
        Commands::Run(args) => handlers::execute_run(&config, &args),
        Commands::Diff(args) => {
            let reporter =
                ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
            handlers::execute_diff(&reporter, &args)
        }
        Commands::Init(args) => handlers::execute_init(&config, &args).map(|()| true),
        Commands::Config(args) => handlers::execute_config(&config, &args).map(|()| true),
        Commands::Clean(args) => handlers::execute_clean(&config, &args).map(|_| true),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let color: ColorChoice = cli.color.clone().into();
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(color)
}
