//! Declaration of one conformance case.

use crate::config::HarnessConfig;
use geotest_driver::Window;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Driver, sample file and expectations for one case. Built once and then
/// only read by the checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSpec {
    driver: String,
    file: String,
    absolute: bool,
    /// 1-based; 0 disables band checks.
    band: usize,
    checksum: Option<u32>,
    /// A zero-sized window means the whole raster.
    window: Window,
    options: Vec<String>,
}

impl TestSpec {
    pub fn new(driver: impl Into<String>, file: impl Into<String>, band: usize, checksum: Option<u32>) -> Self {
        Self {
            driver: driver.into(),
            file: file.into(),
            absolute: false,
            band,
            checksum,
            window: Window::default(),
            options: Vec::new(),
        }
    }

    /// Use `file` as given instead of resolving it under the data directory.
    pub fn with_absolute_path(mut self) -> Self {
        self.absolute = true;
        self
    }

    pub fn with_window(mut self, window: Window) -> Self {
        self.window = window;
        self
    }

    /// Creation options as `KEY=VALUE` strings, passed to the driver verbatim.
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn driver_name(&self) -> &str {
        &self.driver
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn band(&self) -> usize {
        self.band
    }

    pub fn expected_checksum(&self) -> Option<u32> {
        self.checksum
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// The window to checksum for a raster of the given size.
    pub fn effective_window(&self, raster_size: (usize, usize)) -> Window {
        if self.window.xsize == 0 && self.window.ysize == 0 {
            Window::new(self.window.xoff, self.window.yoff, raster_size.0, raster_size.1)
        } else {
            self.window
        }
    }

    pub fn source_path(&self, config: &HarnessConfig) -> PathBuf {
        if self.absolute {
            PathBuf::from(&self.file)
        } else {
            config.data_path(&self.file)
        }
    }

    /// Default scratch target: `<tmp>/<file>.tst`, or under the memory
    /// filesystem prefix when `in_memory`.
    pub fn scratch_path(&self, config: &HarnessConfig, in_memory: bool) -> PathBuf {
        let name = format!("{}.tst", self.file);
        if in_memory {
            config.memory_path(&name)
        } else {
            config.tmp_path(&name)
        }
    }
}
