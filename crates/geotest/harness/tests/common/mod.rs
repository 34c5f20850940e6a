#![allow(dead_code)]

use geotest_driver::{
    Access, Capability, DataType, Dataset, Driver, DriverError, DriverManager, DriverResult,
    GeoTransform, RasterBand,
};
use geotest_harness::{user_srs_to_wkt, DriverConformanceChecker, HarnessConfig, TestSpec};
use geotest_jras::{JrasDriver, RasterDocument, RasterStore};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub const SAMPLE: &str = "byte.jras";
pub const SAMPLE_CHECKSUM: u32 = 4672;
pub const SAMPLE_WINDOW_CHECKSUM: u32 = 1271;
pub const SAMPLE_GEOTRANSFORM: GeoTransform = [440720.0, 60.0, 0.0, 3751320.0, 0.0, -60.0];
/// min, max, mean, population stddev
pub const SAMPLE_STATISTICS: [f64; 4] = [47.0, 174.0, 110.16, 36.9117];

/// 20x20 Byte raster, values `((x*5 + y*13) % 128) + 47`, NAD27 / UTM 11N.
pub fn sample_document() -> RasterDocument {
    let mut doc = RasterDocument::new(20, 20, 1, DataType::Byte);
    doc.bands[0].values = (0..20usize)
        .flat_map(|y| (0..20usize).map(move |x| (((x * 5 + y * 13) % 128) + 47) as f64))
        .collect();
    doc.geo_transform = Some(SAMPLE_GEOTRANSFORM);
    doc.projection = user_srs_to_wkt("EPSG:26711").unwrap();
    doc
}

/// A script directory with `data/byte.jras` and an empty `tmp/`.
pub struct Fixture {
    pub dir: TempDir,
    pub store: Arc<RasterStore>,
    pub manager: Arc<DriverManager>,
    pub config: Arc<HarnessConfig>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::build(HarnessConfig::default(), true)
    }

    pub fn read_only() -> Self {
        Self::build(HarnessConfig::default(), false)
    }

    pub fn with_config(config: HarnessConfig) -> Self {
        Self::build(config, true)
    }

    /// Only a [`QuirkyDriver`] is registered; address it as `QUIRKY`.
    pub fn quirky(quirk: Quirk) -> Self {
        Self::with_driver(HarnessConfig::default(), |store| {
            Arc::new(QuirkyDriver::new(store, quirk))
        })
    }

    fn build(config: HarnessConfig, writable: bool) -> Self {
        Self::with_driver(config, |store| {
            if writable {
                Arc::new(JrasDriver::new(store))
            } else {
                Arc::new(JrasDriver::read_only(store))
            }
        })
    }

    fn with_driver<F>(config: HarnessConfig, make: F) -> Self
    where
        F: FnOnce(Arc<RasterStore>) -> Arc<dyn Driver>,
    {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RasterStore::new());
        let mut manager = DriverManager::new();
        manager.register(make(store.clone()));

        let config = config.rooted_at(dir.path());
        std::fs::create_dir_all(&config.tmp_dir).unwrap();
        store
            .save(&config.data_path(SAMPLE), &sample_document())
            .unwrap();

        Self {
            dir,
            store,
            manager: Arc::new(manager),
            config: Arc::new(config),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn checker(&self, spec: TestSpec) -> DriverConformanceChecker {
        DriverConformanceChecker::new(spec, self.manager.clone(), self.config.clone())
    }

    pub fn sample(&self, checksum: Option<u32>) -> DriverConformanceChecker {
        self.checker(TestSpec::new("JRAS", SAMPLE, 1, checksum))
    }

    pub fn quirky_sample(&self, checksum: Option<u32>) -> DriverConformanceChecker {
        self.checker(TestSpec::new("QUIRKY", SAMPLE, 1, checksum))
    }

    /// Save `doc` next to the sample as `data/<name>`.
    pub fn add_data(&self, name: &str, doc: &RasterDocument) {
        self.store.save(&self.config.data_path(name), doc).unwrap();
    }

    /// Sorted names left in the scratch directory.
    pub fn tmp_entries(&self) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(&self.config.tmp_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// How a [`QuirkyDriver`] misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quirk {
    /// Every dataset other than the sample comes back altered when opened:
    /// pixels and nodata shifted by one, geotransform moved, projection
    /// swapped for WGS84, metadata dropped and descriptions suffixed.
    Lossy,
    /// Datasets returned by `create` refuse every setter.
    RejectSetters,
}

/// JRAS with a deliberate defect.
pub struct QuirkyDriver {
    inner: JrasDriver,
    store: Arc<RasterStore>,
    quirk: Quirk,
}

impl QuirkyDriver {
    pub fn new(store: Arc<RasterStore>, quirk: Quirk) -> Self {
        Self {
            inner: JrasDriver::new(store.clone()),
            store,
            quirk,
        }
    }

    fn alter(&self, path: &Path) -> DriverResult<()> {
        let mut doc = self.store.load(path)?;
        for band in &mut doc.bands {
            band.values.iter_mut().for_each(|v| *v += 1.0);
            band.no_data = band.no_data.map(|v| v + 1.0);
            band.description.push('~');
        }
        doc.geo_transform = doc.geo_transform.map(|mut gt| {
            gt[0] += 1000.0;
            gt
        });
        doc.projection = user_srs_to_wkt("WGS84").map_err(|e| DriverError::Other(e.to_string()))?;
        doc.metadata.clear();
        self.store.save(path, &doc)
    }
}

impl Driver for QuirkyDriver {
    fn short_name(&self) -> &str {
        "QUIRKY"
    }

    fn long_name(&self) -> &str {
        "Misbehaving JSON Raster"
    }

    fn has_capability(&self, capability: Capability) -> bool {
        self.inner.has_capability(capability)
    }

    fn identify(&self, path: &Path) -> bool {
        self.inner.identify(path)
    }

    fn open(&self, path: &Path, access: Access) -> DriverResult<Option<Box<dyn Dataset>>> {
        let is_sample = path.file_name().is_some_and(|name| name == SAMPLE);
        if self.quirk == Quirk::Lossy && !is_sample {
            self.alter(path)?;
        }
        self.inner.open(path, access)
    }

    fn create(
        &self,
        path: &Path,
        xsize: usize,
        ysize: usize,
        bands: usize,
        data_type: DataType,
        options: &[String],
    ) -> DriverResult<Option<Box<dyn Dataset>>> {
        let created = self.inner.create(path, xsize, ysize, bands, data_type, options)?;
        Ok(match self.quirk {
            Quirk::RejectSetters => created.map(|ds| Box::new(Rejecting { inner: ds }) as Box<dyn Dataset>),
            Quirk::Lossy => created,
        })
    }

    fn create_copy(
        &self,
        path: &Path,
        source: &dyn Dataset,
        strict: bool,
        options: &[String],
    ) -> DriverResult<Option<Box<dyn Dataset>>> {
        self.inner.create_copy(path, source, strict, options)
    }

    fn delete(&self, path: &Path) -> DriverResult<()> {
        self.inner.delete(path)
    }
}

/// Reads pass through; writes of any property fail.
struct Rejecting {
    inner: Box<dyn Dataset>,
}

fn rejected(operation: &str) -> DriverError {
    DriverError::Unsupported {
        driver: "QUIRKY".to_string(),
        operation: operation.to_string(),
    }
}

impl Dataset for Rejecting {
    fn raster_size(&self) -> (usize, usize) {
        self.inner.raster_size()
    }

    fn band_count(&self) -> usize {
        self.inner.band_count()
    }

    fn band(&self, index: usize) -> Option<&dyn RasterBand> {
        self.inner.band(index)
    }

    fn band_mut(&mut self, _index: usize) -> Option<&mut dyn RasterBand> {
        None
    }

    fn geo_transform(&self) -> Option<GeoTransform> {
        self.inner.geo_transform()
    }

    fn set_geo_transform(&mut self, _transform: GeoTransform) -> DriverResult<()> {
        Err(rejected("SetGeoTransform"))
    }

    fn projection(&self) -> String {
        self.inner.projection()
    }

    fn set_projection(&mut self, _wkt: &str) -> DriverResult<()> {
        Err(rejected("SetProjection"))
    }

    fn metadata(&self, domain: Option<&str>) -> BTreeMap<String, String> {
        self.inner.metadata(domain)
    }

    fn set_metadata(
        &mut self,
        _metadata: BTreeMap<String, String>,
        _domain: Option<&str>,
    ) -> DriverResult<()> {
        Err(rejected("SetMetadata"))
    }

    fn close(self: Box<Self>) -> DriverResult<()> {
        let this = *self;
        this.inner.close()
    }
}
