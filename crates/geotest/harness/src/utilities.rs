//! Lookup of external command-line utilities.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Argument every utility answers with its library version.
pub const VERSION_FLAG: &str = "--utility_version";

/// Text a genuine utility prints in its version banner.
pub const VERSION_MARKER: &str = "GDAL";

/// Finds utilities in a source tree's `apps/` directory, then on `PATH`.
/// Answers, misses included, are cached per locator.
#[derive(Debug, Clone, Default)]
pub struct UtilityLocator {
    source_tree: Option<PathBuf>,
    cache: HashMap<String, Option<PathBuf>>,
}

impl UtilityLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_tree(mut self, tree: impl Into<PathBuf>) -> Self {
        self.source_tree = Some(tree.into());
        self
    }

    pub fn locate(&mut self, name: &str) -> Option<PathBuf> {
        if let Some(found) = self.cache.get(name) {
            return found.clone();
        }
        let found = self.probe(name);
        match &found {
            Some(path) => tracing::debug!(utility = name, path = %path.display(), "utility found"),
            None => tracing::debug!(utility = name, "utility not found"),
        }
        self.cache.insert(name.to_string(), found.clone());
        found
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }

    fn probe(&self, name: &str) -> Option<PathBuf> {
        let in_tree = self.source_tree.as_ref().map(|tree| tree.join("apps").join(name));
        in_tree
            .into_iter()
            .chain(std::iter::once(PathBuf::from(name)))
            .find(|candidate| answers_version(candidate))
    }
}

fn answers_version(program: &Path) -> bool {
    let output = Command::new(program)
        .arg(VERSION_FLAG)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output();
    match output {
        Ok(output) => String::from_utf8_lossy(&output.stdout).contains(VERSION_MARKER),
        Err(e) => {
            tracing::debug!(program = %program.display(), error = %e, "probe failed");
            false
        }
    }
}
