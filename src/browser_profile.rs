//! Throwaway Chrome profile directories
//!
//! Every cookie refresh launches a fresh browser with its own profile so
//! concurrent refreshes in separate processes never contend for the same
//! SingletonLock.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Prefix of every profile directory this crate creates under the temp dir
pub const PROFILE_PREFIX: &str = "pdpscrape_chrome";

/// Profile directory removed on drop
#[derive(Debug)]
pub struct BrowserProfile {
    path: PathBuf,
}

impl BrowserProfile {
    /// Create a uniquely named profile directory under `parent`
    ///
    /// `create_dir` rather than `create_dir_all` so a name collision fails
    /// instead of silently sharing a directory.
    pub fn create_in(parent: &Path) -> Result<Self> {
        let path = parent.join(format!("{PROFILE_PREFIX}_{}", Uuid::new_v4()));
        std::fs::create_dir(&path)
            .with_context(|| format!("Failed to create profile directory: {}", path.display()))?;
        debug!("Created Chrome profile directory: {}", path.display());
        Ok(Self { path })
    }

    /// Create a profile under the system temp directory
    pub fn create() -> Result<Self> {
        Self::create_in(&std::env::temp_dir())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BrowserProfile {
    fn drop(&mut self) {
        if self.path.exists() {
            debug!("Removing Chrome profile directory: {}", self.path.display());
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!(
                    "Failed to remove profile directory {}: {e}",
                    self.path.display()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_is_unique_and_removed_on_drop() {
        let parent = tempfile::tempdir().expect("tempdir");
        let first = BrowserProfile::create_in(parent.path()).expect("first profile");
        let second = BrowserProfile::create_in(parent.path()).expect("second profile");

        assert_ne!(first.path(), second.path());
        assert!(first.path().is_dir());
        assert!(
            first
                .path()
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(PROFILE_PREFIX))
        );

        let kept = second.path().to_path_buf();
        drop(second);
        assert!(!kept.exists());
        assert!(first.path().exists());
    }
}
