//! The driver conformance checker.
//!
//! Each `test_*` operation runs one validation protocol against the driver
//! named by a [`TestSpec`]:
//!
//! | operation | protocol |
//! |-----------|----------|
//! | [`test_driver_exists`](DriverConformanceChecker::test_driver_exists) | driver lookup |
//! | [`test_open`](DriverConformanceChecker::test_open) | open, then compare SRS, geotransform, statistics, checksum |
//! | [`test_create_copy`](DriverConformanceChecker::test_create_copy) | CreateCopy, check the open handle, reopen, check again |
//! | [`test_create`](DriverConformanceChecker::test_create) | Create, write pixels, check, reopen, check again |
//! | `test_set_*` | Create a scratch dataset, set one property, reopen, compare |
//!
//! Expected mismatches come back as `Ok(TestOutcome::Fail(reason))`. A missing
//! driver or capability is `Ok(TestOutcome::Skip)`. Anything else is an `Err`.

use crate::config::HarnessConfig;
use crate::error::HarnessResult;
use crate::outcome::TestOutcome;
use crate::scratch::ScratchDataset;
use crate::spec::TestSpec;
use crate::srs::{compare_spatial_reference, wkt_equivalent, SpatialReference};
use crate::tolerance::{check_statistics, compare_geotransform, StatisticsMismatch};
use geotest_driver::{
    Access, Capability, Dataset, Driver, DriverError, DriverManager, DriverResult, GeoTransform,
    RasterBand, Statistics, Window,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What a dataset reports when no geotransform is set.
pub const DEFAULT_GEOTRANSFORM: GeoTransform = [0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Geotransform written by the set-and-verify protocols.
pub const SET_GEOTRANSFORM: GeoTransform = [123.0, 1.18, 0.0, 456.0, 0.0, -1.18];

/// Default projection for [`DriverConformanceChecker::test_set_projection`].
/// Non-metre linear units make it a demanding round trip.
pub const OHIO_SOUTH_WKT: &str = r#"PROJCS["NAD83 / Ohio South",GEOGCS["NAD83",DATUM["North_American_Datum_1983",SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],AUTHORITY["EPSG","6269"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.01745329251994328,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4269"]],PROJECTION["Lambert_Conformal_Conic_2SP"],PARAMETER["standard_parallel_1",40.03333333333333],PARAMETER["standard_parallel_2",38.73333333333333],PARAMETER["latitude_of_origin",38],PARAMETER["central_meridian",-82.5],PARAMETER["false_easting",1968500],PARAMETER["false_northing",0],UNIT["feet",0.3048006096012192]]"#;

pub const METADATA_KEY: &str = "TEST_KEY";
pub const METADATA_VALUE: &str = "TestValue";
pub const NODATA_VALUE: f64 = 11.0;
pub const DESCRIPTION: &str = "Description test string";

/// Optional expectations for [`DriverConformanceChecker::test_open`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpenChecks {
    /// User SRS input (WKT, `EPSG:n`, well-known name).
    pub projection: Option<String>,
    pub geotransform: Option<GeoTransform>,
    /// Overrides the pixel-size derived default.
    pub geotransform_epsilon: Option<f64>,
    pub statistics: Option<Statistics>,
    pub approx_statistics: Option<Statistics>,
    /// Overrides the range derived default.
    pub statistics_epsilon: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateCopyOptions {
    pub check_min_max: bool,
    pub check_geotransform: bool,
    pub check_projection: bool,
    /// Write the copy under the memory filesystem prefix.
    pub use_memory_fs: bool,
    pub target: Option<PathBuf>,
    pub strict: bool,
    /// Skip the checks on the still-open output handle.
    pub skip_pre_close_check: bool,
}

impl Default for CreateCopyOptions {
    fn default() -> Self {
        Self {
            check_min_max: true,
            check_geotransform: false,
            check_projection: false,
            use_memory_fs: false,
            target: None,
            strict: false,
            skip_pre_close_check: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateOptions {
    pub target: Option<PathBuf>,
    pub output_bands: usize,
    pub check_min_max: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            target: None,
            output_bands: 3,
            check_min_max: true,
        }
    }
}

/// Runs validation protocols for one [`TestSpec`].
#[derive(Debug, Clone)]
pub struct DriverConformanceChecker {
    spec: TestSpec,
    manager: Arc<DriverManager>,
    config: Arc<HarnessConfig>,
}

impl DriverConformanceChecker {
    pub fn new(spec: TestSpec, manager: Arc<DriverManager>, config: Arc<HarnessConfig>) -> Self {
        Self {
            spec,
            manager,
            config,
        }
    }

    pub fn spec(&self) -> &TestSpec {
        &self.spec
    }

    fn driver(&self) -> Option<Arc<dyn Driver>> {
        self.manager.driver_by_name(self.spec.driver_name())
    }

    /// The driver when present and offering `capability`.
    fn capable_driver(&self, capability: Capability) -> Option<Arc<dyn Driver>> {
        let driver = self.driver()?;
        if driver.has_capability(capability) {
            Some(driver)
        } else {
            tracing::debug!(
                driver = self.spec.driver_name(),
                %capability,
                "capability missing, skipping"
            );
            None
        }
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Dataset>, String> {
        obtained(self.manager.open(path, Access::ReadOnly))
    }

    fn scratch_guard(&self, driver: &Arc<dyn Driver>, path: &Path) -> ScratchDataset {
        ScratchDataset::new(driver.clone(), path.to_path_buf(), self.config.retain_artifacts())
    }

    pub fn test_driver_exists(&self) -> HarnessResult<TestOutcome> {
        match self.driver() {
            Some(_) => Ok(TestOutcome::Success),
            None => Ok(TestOutcome::fail(format!(
                "{} driver not found!",
                self.spec.driver_name()
            ))),
        }
    }

    /// Open the sample read-only and compare it against `checks` and the
    /// expected checksum.
    pub fn test_open(&self, checks: &OpenChecks) -> HarnessResult<TestOutcome> {
        if self.driver().is_none() {
            return Ok(TestOutcome::Skip);
        }
        let path = self.spec.source_path(&self.config);
        let ds = match self.open(&path) {
            Ok(ds) => ds,
            Err(_) => return Ok(failed_to_open(&path)),
        };
        let window = self.spec.effective_window(ds.raster_size());

        if let Some(expected) = &checks.projection {
            let actual = ds.projection();
            if !compare_spatial_reference(expected, &actual)? {
                tracing::warn!(old = %pretty(expected), new = %pretty(&actual), "projection mismatch");
                return Ok(TestOutcome::fail("Projections differ"));
            }
        }

        if let Some(expected) = &checks.geotransform {
            let epsilon = checks
                .geotransform_epsilon
                .unwrap_or_else(|| self.config.tolerances.geotransform_epsilon(expected));
            let actual = ds.geo_transform().unwrap_or(DEFAULT_GEOTRANSFORM);
            if !compare_geotransform(expected, &actual, epsilon) {
                tracing::warn!(old = ?expected, new = ?actual, epsilon, "geotransform mismatch");
                return Ok(TestOutcome::fail("Geotransform differs."));
            }
        }

        let band_index = self.spec.band();
        if band_index == 0 {
            return Ok(TestOutcome::Success);
        }
        let band = band_of(ds.as_ref(), band_index)?;
        let checksum = band.checksum(Some(window))?;

        if let Some(expected) = &checks.approx_statistics {
            let actual = band.statistics(true, true)?;
            if let Some(outcome) =
                self.statistics_outcome(expected, &actual, checks, "Approximate statistics differs.")
            {
                return Ok(outcome);
            }
        }

        if let Some(expected) = &checks.statistics {
            let actual = band.statistics(false, true)?;
            if let Some(outcome) =
                self.statistics_outcome(expected, &actual, checks, "Statistics differs.")
            {
                return Ok(outcome);
            }
        }

        match self.spec.expected_checksum() {
            Some(expected) if expected != checksum => Ok(TestOutcome::fail(format!(
                "Checksum for band {} in \"{}\" is {}, but expected {}.",
                band_index,
                self.spec.file(),
                checksum,
                expected
            ))),
            _ => Ok(TestOutcome::Success),
        }
    }

    fn statistics_outcome(
        &self,
        expected: &Statistics,
        actual: &Statistics,
        checks: &OpenChecks,
        mismatch: &str,
    ) -> Option<TestOutcome> {
        let epsilon = checks
            .statistics_epsilon
            .unwrap_or_else(|| self.config.tolerances.statistics_epsilon(expected));
        match check_statistics(expected, actual, epsilon) {
            Ok(()) => None,
            Err(m @ StatisticsMismatch::NonFinite { .. }) => Some(TestOutcome::fail(m.to_string())),
            Err(m @ StatisticsMismatch::OutOfTolerance { .. }) => {
                tracing::warn!(old = ?expected, new = ?actual, detail = %m, "statistics mismatch");
                Some(TestOutcome::fail(mismatch))
            }
        }
    }

    /// Copy the sample with CreateCopy and verify the copy before and after
    /// it is closed. The copy is deleted afterwards unless artifacts are kept.
    pub fn test_create_copy(&self, options: &CreateCopyOptions) -> HarnessResult<TestOutcome> {
        let Some(driver) = self.capable_driver(Capability::CreateCopy) else {
            return Ok(TestOutcome::Skip);
        };
        if options.use_memory_fs && !driver.has_capability(Capability::VirtualIo) {
            return Ok(TestOutcome::Skip);
        }

        let src_path = self.spec.source_path(&self.config);
        let src = match self.open(&src_path) {
            Ok(ds) => ds,
            Err(_) => return Ok(failed_to_open(&src_path)),
        };
        let band_index = self.spec.band();
        let min_max = if band_index > 0 && options.check_min_max {
            Some(band_of(src.as_ref(), band_index)?.compute_min_max(false)?)
        } else {
            None
        };
        let src_projection = src.projection();
        let src_geotransform = src.geo_transform().unwrap_or(DEFAULT_GEOTRANSFORM);

        let target = options
            .target
            .clone()
            .unwrap_or_else(|| self.spec.scratch_path(&self.config, options.use_memory_fs));
        let _scratch = self.scratch_guard(&driver, &target);

        tracing::debug!(target = %target.display(), strict = options.strict, "CreateCopy");
        let created = driver.create_copy(&target, src.as_ref(), options.strict, self.spec.options());
        let copy = match obtained(created) {
            Ok(ds) => ds,
            Err(message) => {
                let mut reason = "Failed to create test file using CreateCopy method.".to_string();
                if !message.is_empty() {
                    reason.push('\n');
                    reason.push_str(&message);
                }
                return Ok(TestOutcome::Fail(reason));
            }
        };

        if band_index > 0 && !options.skip_pre_close_check {
            let band = band_of(copy.as_ref(), band_index)?;
            if let Some(outcome) =
                self.copied_band_outcome(band, min_max, options.check_min_max, "still-open")?
            {
                return Ok(outcome);
            }
        }
        copy.close()?;

        let reopened = match self.open(&target) {
            Ok(ds) => ds,
            Err(_) => return Ok(failed_to_open(&target)),
        };

        if band_index > 0 {
            let band = band_of(reopened.as_ref(), band_index)?;
            if let Some(outcome) =
                self.copied_band_outcome(band, min_max, options.check_min_max, "reopened")?
            {
                return Ok(outcome);
            }
        }

        if options.check_geotransform {
            let epsilon = self.config.tolerances.copy_geotransform_epsilon;
            let actual = reopened.geo_transform().unwrap_or(DEFAULT_GEOTRANSFORM);
            if !compare_geotransform(&src_geotransform, &actual, epsilon) {
                tracing::warn!(old = ?src_geotransform, new = ?actual, "geotransform mismatch");
                return Ok(TestOutcome::fail("Geotransform differs."));
            }
        }

        if options.check_projection {
            let actual = reopened.projection();
            if !wkt_equivalent(&src_projection, &actual).unwrap_or(false) {
                tracing::warn!(old = %pretty(&src_projection), new = %pretty(&actual), "projection mismatch");
                return Ok(TestOutcome::fail("Projections differ"));
            }
        }

        Ok(TestOutcome::Success)
    }

    /// Checksum and min/max of a copied band; `stage` names the handle.
    fn copied_band_outcome(
        &self,
        band: &dyn RasterBand,
        expected_min_max: Option<(f64, f64)>,
        check_min_max: bool,
        stage: &str,
    ) -> HarnessResult<Option<TestOutcome>> {
        if let Some(expected) = self.spec.expected_checksum() {
            let got = band.checksum(None)?;
            if got != expected {
                return Ok(Some(TestOutcome::fail(format!(
                    "Did not get expected checksum on {} file.\n    Got {} instead of {}.",
                    stage, got, expected
                ))));
            }
        }
        if !check_min_max {
            return Ok(None);
        }
        let got = band.compute_min_max(false)?;
        if Some(got) != expected_min_max {
            let (emin, emax) = expected_min_max.unwrap_or((f64::NAN, f64::NAN));
            return Ok(Some(TestOutcome::fail(format!(
                "Did not get expected min/max values on {} file.\n    Got {},{} instead of {},{}.",
                stage, got.0, got.1, emin, emax
            ))));
        }
        Ok(None)
    }

    /// Create a dataset from scratch, fill every band with the sample's
    /// pixels, and verify before and after reopening.
    pub fn test_create(&self, options: &CreateOptions) -> HarnessResult<TestOutcome> {
        let Some(driver) = self.capable_driver(Capability::Create) else {
            return Ok(TestOutcome::Skip);
        };

        let src_path = self.spec.source_path(&self.config);
        let src = match self.open(&src_path) {
            Ok(ds) => ds,
            Err(_) => return Ok(failed_to_open(&src_path)),
        };
        let (xsize, ysize) = src.raster_size();
        let src_band = band_of(src.as_ref(), self.source_band())?;
        let data_type = src_band.data_type();
        let pixels = src_band.read_raster(Window::full(xsize, ysize))?;
        let min_max = if options.check_min_max {
            Some(src_band.compute_min_max(false)?)
        } else {
            None
        };
        drop(src);

        let target = options
            .target
            .clone()
            .unwrap_or_else(|| self.spec.scratch_path(&self.config, false));
        let _scratch = self.scratch_guard(&driver, &target);

        let created = driver.create(
            &target,
            xsize,
            ysize,
            options.output_bands,
            data_type,
            self.spec.options(),
        );
        let mut new_ds = match obtained(created) {
            Ok(ds) => ds,
            Err(_) => {
                return Ok(TestOutcome::fail(
                    "Failed to create test file using Create method.",
                ))
            }
        };

        for index in 1..=options.output_bands {
            let written = new_ds
                .band_mut(index)
                .ok_or(DriverError::BandOutOfRange {
                    index,
                    count: options.output_bands,
                })
                .and_then(|band| band.write_raster(Window::full(xsize, ysize), &pixels));
            if let Err(e) = written {
                tracing::debug!(band = index, error = %e, "write failed");
                return Ok(TestOutcome::fail("Failed to write raster bands to test file."));
            }
        }

        for index in 1..=options.output_bands {
            let band = band_of(new_ds.as_ref(), index)?;
            if let Some(expected) = self.spec.expected_checksum() {
                let got = band.checksum(None)?;
                if got != expected {
                    return Ok(TestOutcome::fail(format!(
                        "Did not get expected checksum on still-open file.\n    Got {} instead of {}.",
                        got, expected
                    )));
                }
            }
            if let Some(expected) = min_max {
                let got = band.compute_min_max(false)?;
                if got != expected {
                    tracing::warn!(expect = ?expected, got = ?got, band = index, "min/max mismatch");
                    return Ok(TestOutcome::fail(
                        "Did not get expected min/max values on still-open file.",
                    ));
                }
            }
        }
        new_ds.close()?;

        let reopened = match self.open(&target) {
            Ok(ds) => ds,
            Err(_) => return Ok(failed_to_open(&target)),
        };
        for index in 1..=options.output_bands {
            let band = band_of(reopened.as_ref(), index)?;
            if let Some(expected) = self.spec.expected_checksum() {
                if band.checksum(None)? != expected {
                    return Ok(TestOutcome::fail(
                        "Did not get expected checksum on reopened file.",
                    ));
                }
            }
            if let Some(expected) = min_max {
                if band.compute_min_max(false)? != expected {
                    return Ok(TestOutcome::fail(
                        "Did not get expected min/max values on reopened file.",
                    ));
                }
            }
        }

        Ok(TestOutcome::Success)
    }

    pub fn test_set_geo_transform(&self) -> HarnessResult<TestOutcome> {
        self.set_and_verify(
            "Failed to set geographic transformation.",
            |ds| ds.set_geo_transform(SET_GEOTRANSFORM),
            |ds| {
                Ok((ds.geo_transform() != Some(SET_GEOTRANSFORM))
                    .then(|| "Did not get expected geotransform.".to_string()))
            },
        )
    }

    /// Round-trip `srs` (or [`OHIO_SOUTH_WKT`]) through a scratch dataset.
    pub fn test_set_projection(&self, srs: Option<&str>) -> HarnessResult<TestOutcome> {
        let input = srs.unwrap_or(OHIO_SOUTH_WKT);
        let expected = SpatialReference::from_user_input(input)?;
        let wkt = match SpatialReference::from_wkt(input) {
            Ok(_) => input.to_string(),
            Err(_) => expected.to_wkt(),
        };

        self.set_and_verify(
            "Failed to set geographic projection string.",
            |ds| {
                ds.set_geo_transform(SET_GEOTRANSFORM)?;
                ds.set_projection(&wkt)
            },
            |ds| {
                let got = ds.projection();
                if compare_spatial_reference(input, &got)? {
                    return Ok(None);
                }
                tracing::warn!(got = %pretty(&got), expected = %expected.to_pretty_wkt(), "projection mismatch");
                Ok(Some("Did not get expected projection reference.".to_string()))
            },
        )
    }

    pub fn test_set_metadata(&self) -> HarnessResult<TestOutcome> {
        self.set_and_verify(
            "Failed to set metadata item.",
            |ds| {
                let mut metadata = BTreeMap::new();
                metadata.insert(METADATA_KEY.to_string(), METADATA_VALUE.to_string());
                ds.set_metadata(metadata, None)
            },
            |ds| {
                let metadata = ds.metadata(None);
                Ok((metadata.get(METADATA_KEY).map(String::as_str) != Some(METADATA_VALUE))
                    .then(|| "Did not get expected metadata item.".to_string()))
            },
        )
    }

    pub fn test_set_no_data_value(&self) -> HarnessResult<TestOutcome> {
        self.set_and_verify(
            "Failed to set NoData value.",
            |ds| first_band_mut(ds)?.set_no_data_value(NODATA_VALUE),
            |ds| {
                let band = band_of(ds, 1)?;
                Ok((band.no_data_value() != Some(NODATA_VALUE))
                    .then(|| "Did not get expected NoData value.".to_string()))
            },
        )
    }

    pub fn test_set_description(&self) -> HarnessResult<TestOutcome> {
        self.set_and_verify(
            "Failed to set description.",
            |ds| first_band_mut(ds)?.set_description(DESCRIPTION),
            |ds| {
                let band = band_of(ds, 1)?;
                Ok((band.description() != DESCRIPTION)
                    .then(|| "Did not get expected description string.".to_string()))
            },
        )
    }

    /// Band providing the data type and pixels for scratch datasets. Band 0
    /// falls back to the first band.
    fn source_band(&self) -> usize {
        self.spec.band().max(1)
    }

    /// Shared protocol of the `test_set_*` operations: create a one-band
    /// scratch dataset shaped like the sample, apply `set`, close, reopen,
    /// and let `verify` report a mismatch reason.
    fn set_and_verify<S, V>(&self, set_failure: &str, set: S, verify: V) -> HarnessResult<TestOutcome>
    where
        S: FnOnce(&mut dyn Dataset) -> DriverResult<()>,
        V: FnOnce(&dyn Dataset) -> HarnessResult<Option<String>>,
    {
        let Some(driver) = self.capable_driver(Capability::Create) else {
            return Ok(TestOutcome::Skip);
        };

        let src_path = self.spec.source_path(&self.config);
        let src = match self.open(&src_path) {
            Ok(ds) => ds,
            Err(_) => return Ok(failed_to_open(&src_path)),
        };
        let (xsize, ysize) = src.raster_size();
        let data_type = band_of(src.as_ref(), self.source_band())?.data_type();
        drop(src);

        let target = self.spec.scratch_path(&self.config, false);
        let _scratch = self.scratch_guard(&driver, &target);

        let created = driver.create(&target, xsize, ysize, 1, data_type, self.spec.options());
        let mut new_ds = match obtained(created) {
            Ok(ds) => ds,
            Err(_) => {
                return Ok(TestOutcome::fail(
                    "Failed to create test file using Create method.",
                ))
            }
        };
        if let Err(e) = set(new_ds.as_mut()) {
            tracing::debug!(error = %e, "setter failed");
            return Ok(TestOutcome::fail(set_failure));
        }
        new_ds.close()?;

        let reopened = match self.open(&target) {
            Ok(ds) => ds,
            Err(_) => return Ok(failed_to_open(&target)),
        };
        Ok(match verify(reopened.as_ref())? {
            Some(reason) => TestOutcome::Fail(reason),
            None => TestOutcome::Success,
        })
    }
}

/// A handle, or the driver's error message (empty when it merely declined).
fn obtained(result: DriverResult<Option<Box<dyn Dataset>>>) -> Result<Box<dyn Dataset>, String> {
    match result {
        Ok(Some(ds)) => Ok(ds),
        Ok(None) => Err(String::new()),
        Err(e) => {
            tracing::debug!(error = %e, "driver returned no handle");
            Err(e.to_string())
        }
    }
}

fn failed_to_open(path: &Path) -> TestOutcome {
    TestOutcome::fail(format!("Failed to open dataset: {}", path.display()))
}

fn band_of(ds: &dyn Dataset, index: usize) -> HarnessResult<&dyn RasterBand> {
    ds.band(index).ok_or_else(|| {
        DriverError::BandOutOfRange {
            index,
            count: ds.band_count(),
        }
        .into()
    })
}

fn first_band_mut(ds: &mut dyn Dataset) -> DriverResult<&mut dyn RasterBand> {
    let count = ds.band_count();
    ds.band_mut(1)
        .ok_or(DriverError::BandOutOfRange { index: 1, count })
}

fn pretty(srs: &str) -> String {
    SpatialReference::from_user_input(srs)
        .map(|s| s.to_pretty_wkt())
        .unwrap_or_else(|_| srs.to_string())
}
