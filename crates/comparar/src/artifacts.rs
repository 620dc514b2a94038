//! Artifact naming and storage.
//!
//! Every combination maps to one deterministic file name, so repeated runs
//! overwrite rather than accumulate and no two tasks write the same path.

use crate::config::{ArtifactLayout, Viewport};
use crate::result::{CompararError, CompararResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Suffix of diff artifacts
pub const DIFF_SUFFIX: &str = "_diff.png";

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("static regex"))
}

/// File-name-safe slug for a route; `/` becomes `home`
#[must_use]
pub fn route_slug(route: &str) -> String {
    let trimmed = route.trim_matches('/');
    if trimmed.is_empty() {
        return "home".to_string();
    }
    unsafe_chars().replace_all(&trimmed.replace('/', "_"), "_").into_owned()
}

/// Base file name for a combination, without extension
#[must_use]
pub fn screenshot_name(route: &str, viewport: &Viewport, browser: &str) -> String {
    format!(
        "{}_{}_{}",
        route_slug(route),
        unsafe_chars().replace_all(&viewport.name, "_"),
        unsafe_chars().replace_all(browser, "_")
    )
}

/// The three artifact paths of one combination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    /// Local screenshot
    pub local: PathBuf,
    /// Production screenshot
    pub production: PathBuf,
    /// Diff image (only written when the combination differs)
    pub diff: PathBuf,
}

/// Writes artifacts into an [`ArtifactLayout`]
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    layout: ArtifactLayout,
}

impl ArtifactStore {
    /// Create a store over a layout
    #[must_use]
    pub const fn new(layout: ArtifactLayout) -> Self {
        Self { layout }
    }

    /// The underlying layout
    #[must_use]
    pub const fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Paths for a screenshot name
    #[must_use]
    pub fn paths(&self, name: &str) -> ArtifactPaths {
        ArtifactPaths {
            local: self.layout.screenshots_dir.join(format!("{name}.png")),
            production: self.layout.production_dir.join(format!("{name}.png")),
            diff: self.layout.diff_dir.join(format!("{name}{DIFF_SUFFIX}")),
        }
    }

    /// Create all artifact directories
    ///
    /// # Errors
    ///
    /// Returns a storage error naming the directory that could not be created
    pub async fn ensure_dirs(&self) -> CompararResult<()> {
        for dir in [
            &self.layout.screenshots_dir,
            &self.layout.production_dir,
            &self.layout.diff_dir,
        ] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| CompararError::storage(dir, e))?;
        }
        Ok(())
    }

    /// Write bytes via a temporary sibling file and a rename
    ///
    /// # Errors
    ///
    /// Returns a storage error if either step fails
    pub async fn write(&self, path: &Path, bytes: &[u8]) -> CompararResult<()> {
        write_atomic(path, bytes).await
    }

    /// Remove stale diff images; returns how many were removed
    ///
    /// # Errors
    ///
    /// Returns a storage error if the directory cannot be read or a file
    /// cannot be removed
    pub async fn clean_diffs(&self) -> CompararResult<usize> {
        let dir = &self.layout.diff_dir;
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(CompararError::storage(dir, e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CompararError::storage(dir, e))?
        {
            let path = entry.path();
            let is_diff = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(DIFF_SUFFIX));
            if is_diff {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| CompararError::storage(&path, e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Write `bytes` to `path` through a `.tmp` sibling and a rename
///
/// # Errors
///
/// Returns a storage error naming `path`
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> CompararResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CompararError::storage(parent, e))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| CompararError::storage(path, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| CompararError::storage(path, e))
}
