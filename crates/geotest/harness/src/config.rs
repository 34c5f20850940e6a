//! Harness configuration.

use crate::error::{HarnessError, HarnessResult};
use crate::tolerance::ToleranceDefaults;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Config option that retains scratch artifacts when set to `ON`.
pub const DEBUG_OPTION: &str = "CPL_DEBUG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Where sample files live, relative to the script directory.
    pub data_dir: PathBuf,
    /// Where scratch datasets are written.
    pub tmp_dir: PathBuf,
    pub memory_fs_prefix: String,
    pub keep_artifacts: bool,
    pub tolerances: ToleranceDefaults,
    /// Library config options (`KEY=VALUE`), forwarded to the driver manager.
    pub config_options: BTreeMap<String, String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            tmp_dir: PathBuf::from("tmp"),
            memory_fs_prefix: "/vsimem/".to_string(),
            keep_artifacts: false,
            tolerances: ToleranceDefaults::default(),
            config_options: BTreeMap::new(),
        }
    }
}

impl HarnessConfig {
    /// Defaults overridden by `GEOTEST_DATA_DIR`, `GEOTEST_TMP_DIR`,
    /// `GEOTEST_KEEP_ARTIFACTS` and `CPL_DEBUG`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("GEOTEST_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("GEOTEST_TMP_DIR") {
            config.tmp_dir = PathBuf::from(dir);
        }
        if let Ok(flag) = std::env::var("GEOTEST_KEEP_ARTIFACTS") {
            config.keep_artifacts = is_truthy(&flag);
        }
        if let Ok(debug) = std::env::var(DEBUG_OPTION) {
            config.config_options.insert(DEBUG_OPTION.to_string(), debug);
        }
        config
    }

    /// Load a TOML config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> HarnessResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| HarnessError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn with_config_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config_options.insert(key.into(), value.into());
        self
    }

    /// Explicit option, then the process environment, then `default`.
    pub fn config_option(&self, key: &str, default: &str) -> String {
        self.config_options
            .get(key)
            .cloned()
            .or_else(|| std::env::var(key).ok())
            .unwrap_or_else(|| default.to_string())
    }

    /// Whether scratch artifacts survive a check.
    pub fn retain_artifacts(&self) -> bool {
        self.keep_artifacts || self.config_option(DEBUG_OPTION, "OFF").eq_ignore_ascii_case("ON")
    }

    /// Copy with relative data and tmp directories resolved under `dir`.
    pub fn rooted_at(&self, dir: &Path) -> Self {
        let mut rooted = self.clone();
        rooted.data_dir = dir.join(&self.data_dir);
        rooted.tmp_dir = dir.join(&self.tmp_dir);
        rooted
    }

    pub fn data_path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    pub fn tmp_path(&self, file: &str) -> PathBuf {
        self.tmp_dir.join(file)
    }

    pub fn memory_path(&self, file: &str) -> PathBuf {
        PathBuf::from(format!("{}{}", self.memory_fs_prefix, file))
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "on" | "yes" | "true"
    )
}
