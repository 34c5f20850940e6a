//! Driver, dataset and band traits.

use crate::error::DriverResult;
use crate::types::{Access, Capability, DataType, GeoTransform, Statistics, Window};
use std::collections::BTreeMap;
use std::path::Path;

/// One format implementation.
///
/// Constructors return `Ok(None)` when the driver declines without raising
/// an error; callers treat that the same as an `Err`.
pub trait Driver: Send + Sync {
    /// Short identifier used for lookup, e.g. `"GTiff"`.
    fn short_name(&self) -> &str;

    fn long_name(&self) -> &str;

    fn has_capability(&self, capability: Capability) -> bool;

    /// Whether this driver recognizes the dataset at `path`.
    fn identify(&self, path: &Path) -> bool;

    fn open(&self, path: &Path, access: Access) -> DriverResult<Option<Box<dyn Dataset>>>;

    fn create(
        &self,
        path: &Path,
        xsize: usize,
        ysize: usize,
        bands: usize,
        data_type: DataType,
        options: &[String],
    ) -> DriverResult<Option<Box<dyn Dataset>>>;

    fn create_copy(
        &self,
        path: &Path,
        source: &dyn Dataset,
        strict: bool,
        options: &[String],
    ) -> DriverResult<Option<Box<dyn Dataset>>>;

    fn delete(&self, path: &Path) -> DriverResult<()>;
}

/// An open dataset handle.
pub trait Dataset {
    fn raster_size(&self) -> (usize, usize);

    fn band_count(&self) -> usize;

    /// 1-based band access.
    fn band(&self, index: usize) -> Option<&dyn RasterBand>;

    fn band_mut(&mut self, index: usize) -> Option<&mut dyn RasterBand>;

    fn geo_transform(&self) -> Option<GeoTransform>;

    fn set_geo_transform(&mut self, transform: GeoTransform) -> DriverResult<()>;

    /// Projection as WKT; empty when none is set.
    fn projection(&self) -> String;

    fn set_projection(&mut self, wkt: &str) -> DriverResult<()>;

    /// Metadata of `domain` (`None` is the default domain).
    fn metadata(&self, domain: Option<&str>) -> BTreeMap<String, String>;

    fn set_metadata(
        &mut self,
        metadata: BTreeMap<String, String>,
        domain: Option<&str>,
    ) -> DriverResult<()>;

    /// Flush pending writes and release the handle. Dropping a handle also
    /// flushes, but swallows the error.
    fn close(self: Box<Self>) -> DriverResult<()>;
}

/// One band of a dataset.
pub trait RasterBand {
    fn data_type(&self) -> DataType;

    fn size(&self) -> (usize, usize);

    /// Checksum over `window`, or the whole band when `None`.
    fn checksum(&self, window: Option<Window>) -> DriverResult<u32>;

    fn compute_min_max(&self, approx_ok: bool) -> DriverResult<(f64, f64)>;

    fn statistics(&self, approx_ok: bool, force: bool) -> DriverResult<Statistics>;

    /// Raw pixels of `window` in native little-endian layout.
    fn read_raster(&self, window: Window) -> DriverResult<Vec<u8>>;

    fn write_raster(&mut self, window: Window, data: &[u8]) -> DriverResult<()>;

    fn no_data_value(&self) -> Option<f64>;

    fn set_no_data_value(&mut self, value: f64) -> DriverResult<()>;

    fn description(&self) -> String;

    fn set_description(&mut self, description: &str) -> DriverResult<()>;
}
