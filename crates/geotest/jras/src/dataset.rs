//! Open JRAS handles.

use crate::document::{BandDocument, RasterDocument};
use crate::store::RasterStore;
use geotest_driver::{
    checksum_values, Access, DataType, Dataset, DriverError, DriverResult, GeoTransform,
    RasterBand, Statistics, Window,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An open dataset. Edits stay in the handle until [`Dataset::close`] or drop.
#[derive(Debug)]
pub struct JrasDataset {
    store: Arc<RasterStore>,
    path: PathBuf,
    access: Access,
    xsize: usize,
    ysize: usize,
    data_type: DataType,
    geo_transform: Option<GeoTransform>,
    projection: String,
    metadata: BTreeMap<String, BTreeMap<String, String>>,
    bands: Vec<JrasBand>,
    dirty: bool,
    closed: bool,
}

impl JrasDataset {
    pub(crate) fn from_document(
        store: Arc<RasterStore>,
        path: &Path,
        access: Access,
        doc: RasterDocument,
        dirty: bool,
    ) -> Self {
        let bands = doc
            .bands
            .into_iter()
            .map(|b| JrasBand {
                path: path.to_path_buf(),
                access,
                xsize: doc.xsize,
                ysize: doc.ysize,
                data_type: doc.data_type,
                values: b.values,
                no_data: b.no_data,
                description: b.description,
                dirty: false,
            })
            .collect();

        Self {
            store,
            path: path.to_path_buf(),
            access,
            xsize: doc.xsize,
            ysize: doc.ysize,
            data_type: doc.data_type,
            geo_transform: doc.geo_transform,
            projection: doc.projection,
            metadata: doc.metadata,
            bands,
            dirty,
            closed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn to_document(&self) -> RasterDocument {
        let mut doc = RasterDocument::new(0, 0, 0, self.data_type);
        doc.xsize = self.xsize;
        doc.ysize = self.ysize;
        doc.geo_transform = self.geo_transform;
        doc.projection = self.projection.clone();
        doc.metadata = self.metadata.clone();
        doc.bands = self
            .bands
            .iter()
            .map(|b| BandDocument {
                values: b.values.clone(),
                no_data: b.no_data,
                description: b.description.clone(),
            })
            .collect();
        doc
    }

    fn needs_flush(&self) -> bool {
        self.access == Access::Update && (self.dirty || self.bands.iter().any(|b| b.dirty))
    }

    fn flush(&mut self) -> DriverResult<()> {
        if self.needs_flush() {
            self.store.save(&self.path, &self.to_document())?;
            self.dirty = false;
            for band in &mut self.bands {
                band.dirty = false;
            }
        }
        Ok(())
    }

    fn require_update(&self) -> DriverResult<()> {
        match self.access {
            Access::Update => Ok(()),
            Access::ReadOnly => Err(DriverError::ReadOnly(self.path.clone())),
        }
    }
}

impl Dataset for JrasDataset {
    fn raster_size(&self) -> (usize, usize) {
        (self.xsize, self.ysize)
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn band(&self, index: usize) -> Option<&dyn RasterBand> {
        if index == 0 {
            return None;
        }
        self.bands.get(index - 1).map(|b| b as &dyn RasterBand)
    }

    fn band_mut(&mut self, index: usize) -> Option<&mut dyn RasterBand> {
        if index == 0 {
            return None;
        }
        self.bands
            .get_mut(index - 1)
            .map(|b| b as &mut dyn RasterBand)
    }

    fn geo_transform(&self) -> Option<GeoTransform> {
        self.geo_transform
    }

    fn set_geo_transform(&mut self, transform: GeoTransform) -> DriverResult<()> {
        self.require_update()?;
        self.geo_transform = Some(transform);
        self.dirty = true;
        Ok(())
    }

    fn projection(&self) -> String {
        self.projection.clone()
    }

    fn set_projection(&mut self, wkt: &str) -> DriverResult<()> {
        self.require_update()?;
        self.projection = wkt.to_string();
        self.dirty = true;
        Ok(())
    }

    fn metadata(&self, domain: Option<&str>) -> BTreeMap<String, String> {
        self.metadata
            .get(&RasterDocument::domain_key(domain))
            .cloned()
            .unwrap_or_default()
    }

    fn set_metadata(
        &mut self,
        metadata: BTreeMap<String, String>,
        domain: Option<&str>,
    ) -> DriverResult<()> {
        self.require_update()?;
        self.metadata
            .insert(RasterDocument::domain_key(domain), metadata);
        self.dirty = true;
        Ok(())
    }

    fn close(mut self: Box<Self>) -> DriverResult<()> {
        let result = self.flush();
        self.closed = true;
        result
    }
}

impl Drop for JrasDataset {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.flush() {
            tracing::warn!(path = %self.path.display(), error = %e, "flush on drop failed");
        }
    }
}

/// One band of a [`JrasDataset`].
#[derive(Debug)]
pub struct JrasBand {
    path: PathBuf,
    access: Access,
    xsize: usize,
    ysize: usize,
    data_type: DataType,
    values: Vec<f64>,
    no_data: Option<f64>,
    description: String,
    dirty: bool,
}

impl JrasBand {
    fn check_window(&self, window: &Window) -> DriverResult<()> {
        if window.fits(self.xsize, self.ysize) {
            Ok(())
        } else {
            Err(DriverError::WindowOutOfRange {
                xoff: window.xoff,
                yoff: window.yoff,
                xsize: window.xsize,
                ysize: window.ysize,
                width: self.xsize,
                height: self.ysize,
            })
        }
    }

    fn window_values(&self, window: Window) -> impl Iterator<Item = f64> + '_ {
        (window.yoff..window.yoff + window.ysize).flat_map(move |y| {
            let start = y * self.xsize + window.xoff;
            self.values[start..start + window.xsize].iter().copied()
        })
    }

    fn valid_values(&self) -> impl Iterator<Item = f64> + '_ {
        let no_data = self.no_data;
        self.values.iter().copied().filter(move |v| {
            !v.is_nan()
                && match no_data {
                    Some(nd) => *v != nd,
                    None => true,
                }
        })
    }

    fn require_update(&self) -> DriverResult<()> {
        match self.access {
            Access::Update => Ok(()),
            Access::ReadOnly => Err(DriverError::ReadOnly(self.path.clone())),
        }
    }
}

impl RasterBand for JrasBand {
    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn size(&self) -> (usize, usize) {
        (self.xsize, self.ysize)
    }

    fn checksum(&self, window: Option<Window>) -> DriverResult<u32> {
        let window = window.unwrap_or_else(|| Window::full(self.xsize, self.ysize));
        self.check_window(&window)?;
        Ok(checksum_values(self.window_values(window)))
    }

    fn compute_min_max(&self, _approx_ok: bool) -> DriverResult<(f64, f64)> {
        let mut values = self.valid_values();
        let first = values.next().ok_or(DriverError::NoValidPixels)?;
        Ok(values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// Population statistics over valid pixels. A band without valid pixels
    /// yields NaN for every field.
    fn statistics(&self, _approx_ok: bool, _force: bool) -> DriverResult<Statistics> {
        let (mut count, mut sum, mut sum_sq) = (0usize, 0.0f64, 0.0f64);
        let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
        for v in self.valid_values() {
            count += 1;
            sum += v;
            sum_sq += v * v;
            min = min.min(v);
            max = max.max(v);
        }
        if count == 0 {
            return Ok(Statistics::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN));
        }
        let mean = sum / count as f64;
        let variance = (sum_sq / count as f64 - mean * mean).max(0.0);
        Ok(Statistics::new(min, max, mean, variance.sqrt()))
    }

    fn read_raster(&self, window: Window) -> DriverResult<Vec<u8>> {
        self.check_window(&window)?;
        let mut out = Vec::with_capacity(window.pixel_count() * self.data_type.size_bytes());
        for v in self.window_values(window) {
            self.data_type.encode(v, &mut out);
        }
        Ok(out)
    }

    fn write_raster(&mut self, window: Window, data: &[u8]) -> DriverResult<()> {
        self.require_update()?;
        self.check_window(&window)?;
        let size = self.data_type.size_bytes();
        let expected = window.pixel_count() * size;
        if data.len() != expected {
            return Err(DriverError::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        for (i, pixel) in data.chunks_exact(size).enumerate() {
            let x = window.xoff + i % window.xsize;
            let y = window.yoff + i / window.xsize;
            self.values[y * self.xsize + x] = self.data_type.decode(pixel);
        }
        self.dirty = true;
        Ok(())
    }

    fn no_data_value(&self) -> Option<f64> {
        self.no_data
    }

    fn set_no_data_value(&mut self, value: f64) -> DriverResult<()> {
        self.require_update()?;
        self.no_data = Some(value);
        self.dirty = true;
        Ok(())
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn set_description(&mut self, description: &str) -> DriverResult<()> {
        self.require_update()?;
        self.description = description.to_string();
        self.dirty = true;
        Ok(())
    }
}
