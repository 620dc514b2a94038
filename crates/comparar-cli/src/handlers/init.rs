//! Init command handler

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::InitArgs;
use comparar::VisualRegressionConfig;

/// Default configuration as commented YAML
pub fn default_config_yaml() -> CliResult<String> {
    let body = VisualRegressionConfig::default().to_yaml()?;
    Ok(format!(
        "# Comparar visual regression configuration\n\
         # threshold: fraction of pixels allowed to differ per page\n\
         # per_pixel_threshold: colour distance before a pixel counts as different\n\
         {body}"
    ))
}

/// Execute the init command
pub fn execute_init(cli: &CliConfig, args: &InitArgs) -> CliResult<()> {
    if args.path.exists() && !args.force {
        return Err(CliError::config(format!(
            "{} already exists (use --force to overwrite)",
            args.path.display()
        )));
    }

    if let Some(parent) = args.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&args.path, default_config_yaml()?)?;

    if !cli.verbosity.is_quiet() {
        println!("Created: {}", args.path.display());
    }
    Ok(())
}
