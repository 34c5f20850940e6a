//! Driver registry.

use crate::error::DriverResult;
use crate::traits::{Dataset, Driver};
use crate::types::Access;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Registered drivers plus library-wide config options.
#[derive(Default)]
pub struct DriverManager {
    drivers: Vec<Arc<dyn Driver>>,
    config: RwLock<BTreeMap<String, String>>,
}

impl DriverManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver. A driver with the same short name replaces the
    /// earlier registration.
    pub fn register(&mut self, driver: Arc<dyn Driver>) {
        self.drivers
            .retain(|d| !d.short_name().eq_ignore_ascii_case(driver.short_name()));
        tracing::debug!(driver = driver.short_name(), "registered driver");
        self.drivers.push(driver);
    }

    /// Case-insensitive lookup by short name.
    pub fn driver_by_name(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers
            .iter()
            .find(|d| d.short_name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }

    pub fn driver_names(&self) -> Vec<String> {
        self.drivers
            .iter()
            .map(|d| d.short_name().to_string())
            .collect()
    }

    pub fn drivers(&self) -> impl Iterator<Item = &Arc<dyn Driver>> {
        self.drivers.iter()
    }

    /// Open `path` with the first driver that identifies it.
    pub fn open(&self, path: &Path, access: Access) -> DriverResult<Option<Box<dyn Dataset>>> {
        for driver in &self.drivers {
            if driver.identify(path) {
                tracing::debug!(driver = driver.short_name(), path = %path.display(), "opening");
                return driver.open(path, access);
            }
        }
        tracing::debug!(path = %path.display(), "no driver identified dataset");
        Ok(None)
    }

    /// Set (or with `None`, clear) a config option.
    pub fn set_config_option(&self, key: &str, value: Option<&str>) {
        let mut config = match self.config.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match value {
            Some(v) => {
                config.insert(key.to_string(), v.to_string());
            }
            None => {
                config.remove(key);
            }
        }
    }

    pub fn config_option(&self, key: &str) -> Option<String> {
        let config = match self.config.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        config.get(key).cloned()
    }
}

impl std::fmt::Debug for DriverManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverManager")
            .field("drivers", &self.driver_names())
            .finish()
    }
}
