//! Config command handler

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::ConfigArgs;
use comparar::VisualRegressionConfig;
use std::path::Path;

/// Configuration file picked up from the working directory when no
/// `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "comparar.yaml";

/// Load the explicit file, else `comparar.yaml` if present, else defaults
pub fn resolve_config(path: Option<&Path>) -> CliResult<VisualRegressionConfig> {
    match path {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            Ok(VisualRegressionConfig::load(path)?)
        }
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.exists() {
                Ok(VisualRegressionConfig::load(default)?)
            } else {
                Ok(VisualRegressionConfig::default())
            }
        }
    }
}

/// Render the configuration as YAML or JSON
pub fn render_config(config: &VisualRegressionConfig, json: bool) -> CliResult<String> {
    if json {
        serde_json::to_string_pretty(config).map_err(|e| CliError::config(e.to_string()))
    } else {
        Ok(config.to_yaml()?)
    }
}

/// Execute the config command
pub fn execute_config(cli: &CliConfig, args: &ConfigArgs) -> CliResult<()> {
    let config = resolve_config(args.config.as_deref())?;
    if let Err(e) = config.validate() {
        if !cli.verbosity.is_quiet() {
            eprintln!("Warning: {e}");
        }
    }
    println!("{}", render_config(&config, args.json)?);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vr.yaml");
        std::fs::write(&path, "routes: [\"/pricing\"]\nthreshold: 0.02\n").unwrap();
        let config = resolve_config(Some(&path)).unwrap();
        assert_eq!(config.routes, ["/pricing"]);
        assert_eq!(config.threshold, 0.02);
        assert_eq!(config.concurrency, comparar::DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_resolve_missing_file() {
        let err = resolve_config(Some(Path::new("/nonexistent/vr.yaml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_resolve_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vr.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            resolve_config(Some(&path)),
            Err(CliError::Comparar(_))
        ));
    }

    #[test]
    fn test_render_yaml_and_json() {
        let config = VisualRegressionConfig::default();
        let yaml = render_config(&config, false).unwrap();
        assert!(yaml.contains("production_origin"));
        let json = render_config(&config, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["concurrency"], 2);
    }
}
