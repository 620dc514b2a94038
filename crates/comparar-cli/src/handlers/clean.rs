//! Clean command handler

use super::{resolve_config, runtime};
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::CleanArgs;
use comparar::ArtifactStore;

/// Execute the clean command; returns how many diff images were removed
pub fn execute_clean(cli: &CliConfig, args: &CleanArgs) -> CliResult<usize> {
    let config = resolve_config(args.config.as_deref())?;
    let store = ArtifactStore::new(config.artifacts);
    let removed = runtime()?.block_on(store.clean_diffs())?;

    if !cli.verbosity.is_quiet() {
        println!(
            "Removed {removed} diff image(s) from {}",
            store.layout().diff_dir.display()
        );
    }
    Ok(removed)
}
