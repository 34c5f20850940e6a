//! Scratch artifacts produced by checks.

use crate::error::HarnessResult;
use crate::outcome::TestOutcome;
use geotest_driver::Driver;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Entries of the scratch directory that [`clean_tmp`] leaves alone.
pub const PRESERVED_ENTRIES: [&str; 2] = ["CVS", "do-not-remove"];

/// Deletes a scratch dataset when dropped, whatever the check's outcome.
///
/// Declare the guard before any handle to the dataset so the handles are
/// dropped (and flushed) first.
pub struct ScratchDataset {
    driver: Arc<dyn Driver>,
    path: PathBuf,
    keep: bool,
}

impl ScratchDataset {
    pub fn new(driver: Arc<dyn Driver>, path: PathBuf, keep: bool) -> Self {
        Self { driver, path, keep }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDataset {
    fn drop(&mut self) {
        if self.keep {
            tracing::debug!(path = %self.path.display(), "keeping scratch dataset");
            return;
        }
        match self.driver.delete(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "deleted scratch dataset"),
            Err(e) => {
                // The driver may not know a half-written file; fall back to the filesystem.
                if self.path.is_file() {
                    let _ = fs::remove_file(&self.path);
                }
                tracing::debug!(path = %self.path.display(), error = %e, "driver delete failed");
            }
        }
    }
}

/// Remove every file in `dir` except the [`PRESERVED_ENTRIES`]. Individual
/// removal failures are ignored.
pub fn clean_tmp(dir: &Path) -> HarnessResult<TestOutcome> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if PRESERVED_ENTRIES.iter().any(|p| name == *p) {
            continue;
        }
        if let Err(e) = fs::remove_file(entry.path()) {
            tracing::debug!(path = %entry.path().display(), error = %e, "could not remove");
        }
    }
    Ok(TestOutcome::Success)
}
