//! Test script manifests.
//!
//! A script is a TOML file holding a list of declarative checks:
//!
//! ```toml
//! name = "jras"
//!
//! [[test]]
//! check = "open"
//! driver = "JRAS"
//! file = "byte.jras"
//! checksum = 4672
//! geotransform = [440720.0, 60.0, 0.0, 3751320.0, 0.0, -60.0]
//!
//! [[test]]
//! check = "create_copy"
//! driver = "JRAS"
//! file = "byte.jras"
//! checksum = 4672
//! check_geotransform = true
//! ```

use crate::checker::{CreateCopyOptions, CreateOptions, DriverConformanceChecker, OpenChecks};
use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::runner::TestCase;
use crate::scratch::clean_tmp;
use crate::spec::TestSpec;
use geotest_driver::{DriverManager, GeoTransform, Statistics, Window};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which checker protocol an entry runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    DriverExists,
    Open,
    CreateCopy,
    Create,
    SetGeoTransform,
    SetProjection,
    SetMetadata,
    SetNoDataValue,
    SetDescription,
    CleanTmp,
}

impl CheckKind {
    /// Name shown on the test line.
    pub fn test_name(self) -> &'static str {
        match self {
            Self::DriverExists => "test_driver_exists",
            Self::Open => "test_open",
            Self::CreateCopy => "test_create_copy",
            Self::Create => "test_create",
            Self::SetGeoTransform => "test_set_geo_transform",
            Self::SetProjection => "test_set_projection",
            Self::SetMetadata => "test_set_metadata",
            Self::SetNoDataValue => "test_set_no_data_value",
            Self::SetDescription => "test_set_description",
            Self::CleanTmp => "clean_tmp",
        }
    }
}

/// A whole script file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "test")]
    pub tests: Vec<TestEntry>,
}

fn yes() -> bool {
    true
}

fn one() -> usize {
    1
}

fn three() -> usize {
    3
}

/// One `[[test]]` table. Fields a check does not use are ignored by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestEntry {
    pub check: CheckKind,
    pub label: Option<String>,

    // TestSpec
    pub driver: Option<String>,
    pub file: Option<String>,
    #[serde(default)]
    pub absolute: bool,
    #[serde(default = "one")]
    pub band: usize,
    pub checksum: Option<u32>,
    /// `[xoff, yoff, xsize, ysize]`
    pub window: Option<[usize; 4]>,
    #[serde(default)]
    pub options: Vec<String>,

    // open
    pub projection: Option<String>,
    pub geotransform: Option<GeoTransform>,
    pub geotransform_epsilon: Option<f64>,
    /// `[min, max, mean, stddev]`
    pub statistics: Option<[f64; 4]>,
    pub approx_statistics: Option<[f64; 4]>,
    pub statistics_epsilon: Option<f64>,

    // create_copy / create
    #[serde(default = "yes")]
    pub check_min_max: bool,
    #[serde(default)]
    pub check_geotransform: bool,
    #[serde(default)]
    pub check_projection: bool,
    #[serde(default)]
    pub use_memory_fs: bool,
    pub target: Option<PathBuf>,
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub skip_pre_close_check: bool,
    #[serde(default = "three")]
    pub output_bands: usize,

    // set_projection
    pub srs: Option<String>,
}

impl TestEntry {
    fn display_name(&self) -> String {
        self.label
            .clone()
            .or_else(|| self.file.clone())
            .unwrap_or_else(|| self.check.test_name().to_string())
    }

    fn require<'a>(&self, value: &'a Option<String>, field: &'static str) -> HarnessResult<&'a str> {
        value.as_deref().ok_or_else(|| HarnessError::MissingField {
            test: self.display_name(),
            field,
        })
    }

    pub fn to_spec(&self) -> HarnessResult<TestSpec> {
        let driver = self.require(&self.driver, "driver")?;
        let file = match self.check {
            CheckKind::DriverExists => self.file.as_deref().unwrap_or(""),
            _ => self.require(&self.file, "file")?,
        };
        let mut spec = TestSpec::new(driver, file, self.band, self.checksum)
            .with_options(self.options.iter().cloned());
        if self.absolute {
            spec = spec.with_absolute_path();
        }
        if let Some([xoff, yoff, xsize, ysize]) = self.window {
            spec = spec.with_window(Window::new(xoff, yoff, xsize, ysize));
        }
        Ok(spec)
    }

    fn open_checks(&self) -> OpenChecks {
        OpenChecks {
            projection: self.projection.clone(),
            geotransform: self.geotransform,
            geotransform_epsilon: self.geotransform_epsilon,
            statistics: self.statistics.map(Statistics::from),
            approx_statistics: self.approx_statistics.map(Statistics::from),
            statistics_epsilon: self.statistics_epsilon,
        }
    }

    fn create_copy_options(&self) -> CreateCopyOptions {
        CreateCopyOptions {
            check_min_max: self.check_min_max,
            check_geotransform: self.check_geotransform,
            check_projection: self.check_projection,
            use_memory_fs: self.use_memory_fs,
            target: self.target.clone(),
            strict: self.strict,
            skip_pre_close_check: self.skip_pre_close_check,
        }
    }

    fn create_options(&self) -> CreateOptions {
        CreateOptions {
            target: self.target.clone(),
            output_bands: self.output_bands,
            check_min_max: self.check_min_max,
        }
    }

    /// Bind the entry to a driver manager and configuration.
    pub fn into_test_case(
        self,
        manager: Arc<DriverManager>,
        config: Arc<HarnessConfig>,
    ) -> HarnessResult<TestCase> {
        let name = self.check.test_name();
        let label = self.label.clone().or_else(|| self.file.clone());

        let case = if self.check == CheckKind::CleanTmp {
            TestCase::new(name, move |_ctx| clean_tmp(&config.tmp_dir))
        } else {
            let checker = DriverConformanceChecker::new(self.to_spec()?, manager, config);
            let entry = self;
            TestCase::new(name, move |_ctx| match entry.check {
                CheckKind::DriverExists => checker.test_driver_exists(),
                CheckKind::Open => checker.test_open(&entry.open_checks()),
                CheckKind::CreateCopy => checker.test_create_copy(&entry.create_copy_options()),
                CheckKind::Create => checker.test_create(&entry.create_options()),
                CheckKind::SetGeoTransform => checker.test_set_geo_transform(),
                CheckKind::SetProjection => checker.test_set_projection(entry.srs.as_deref()),
                CheckKind::SetMetadata => checker.test_set_metadata(),
                CheckKind::SetNoDataValue => checker.test_set_no_data_value(),
                CheckKind::SetDescription => checker.test_set_description(),
                CheckKind::CleanTmp => Ok(crate::outcome::TestOutcome::Skip),
            })
        };

        Ok(match label {
            Some(label) => case.with_label(label),
            None => case,
        })
    }
}

impl ScriptManifest {
    pub fn parse(text: &str) -> HarnessResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> HarnessResult<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// Bind every entry. One malformed entry rejects the whole script.
    pub fn test_cases(
        self,
        manager: Arc<DriverManager>,
        config: Arc<HarnessConfig>,
    ) -> HarnessResult<Vec<TestCase>> {
        self.tests
            .into_iter()
            .map(|entry| entry.into_test_case(manager.clone(), config.clone()))
            .collect()
    }
}

/// `*.toml` files of `dir`, sorted by file name.
pub fn discover_scripts(dir: &Path) -> HarnessResult<Vec<PathBuf>> {
    let mut scripts = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            scripts.push(path);
        }
    }
    scripts.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(scripts)
}
