//! The JRAS driver.

use crate::dataset::JrasDataset;
use crate::document::RasterDocument;
use crate::store::RasterStore;
use geotest_driver::{
    Access, Capability, DataType, Dataset, Driver, DriverError, DriverResult, Window,
};
use std::path::Path;
use std::sync::Arc;

/// Creation option that makes `create`/`create_copy` fail, for exercising
/// the harness's failure paths.
pub const OPTION_REFUSE: &str = "REFUSE=YES";

pub struct JrasDriver {
    store: Arc<RasterStore>,
    writable: bool,
}

impl JrasDriver {
    pub fn new(store: Arc<RasterStore>) -> Self {
        Self {
            store,
            writable: true,
        }
    }

    /// A variant that can only open datasets.
    pub fn read_only(store: Arc<RasterStore>) -> Self {
        Self {
            store,
            writable: false,
        }
    }

    pub fn store(&self) -> &Arc<RasterStore> {
        &self.store
    }

    fn refuses(options: &[String]) -> bool {
        options.iter().any(|o| o.eq_ignore_ascii_case(OPTION_REFUSE))
    }

    fn unsupported(&self, operation: &str) -> DriverError {
        DriverError::Unsupported {
            driver: self.short_name().to_string(),
            operation: operation.to_string(),
        }
    }
}

impl Driver for JrasDriver {
    fn short_name(&self) -> &str {
        "JRAS"
    }

    fn long_name(&self) -> &str {
        "JSON Raster"
    }

    fn has_capability(&self, capability: Capability) -> bool {
        match capability {
            Capability::Open | Capability::VirtualIo => true,
            Capability::Create | Capability::CreateCopy | Capability::Delete => self.writable,
        }
    }

    fn identify(&self, path: &Path) -> bool {
        self.store.looks_like_jras(path)
    }

    fn open(&self, path: &Path, access: Access) -> DriverResult<Option<Box<dyn Dataset>>> {
        if access == Access::Update && !self.writable {
            return Err(self.unsupported("Open(Update)"));
        }
        let doc = self.store.load(path)?;
        Ok(Some(Box::new(JrasDataset::from_document(
            self.store.clone(),
            path,
            access,
            doc,
            false,
        ))))
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
        if !self.writable {
            return Err(self.unsupported("Create"));
        }
        if Self::refuses(options) {
            tracing::debug!(path = %path.display(), "create refused by option");
            return Ok(None);
        }
        let doc = RasterDocument::new(xsize, ysize, bands, data_type);
        // The file exists as soon as Create returns; content lands on close.
        self.store.save(path, &doc)?;
        Ok(Some(Box::new(JrasDataset::from_document(
            self.store.clone(),
            path,
            Access::Update,
            doc,
            false,
        ))))
    }

    fn create_copy(
        &self,
        path: &Path,
        source: &dyn Dataset,
        strict: bool,
        options: &[String],
    ) -> DriverResult<Option<Box<dyn Dataset>>> {
        if !self.writable {
            return Err(self.unsupported("CreateCopy"));
        }
        if Self::refuses(options) {
            return Ok(None);
        }

        let (xsize, ysize) = source.raster_size();
        let band_count = source.band_count();
        let data_type = source
            .band(1)
            .map(|b| b.data_type())
            .unwrap_or(DataType::Byte);

        let mut doc = RasterDocument::new(xsize, ysize, band_count, data_type);
        doc.geo_transform = source.geo_transform();
        doc.projection = source.projection();
        let metadata = source.metadata(None);
        if !metadata.is_empty() {
            doc.metadata
                .insert(RasterDocument::domain_key(None), metadata);
        }

        for index in 1..=band_count {
            let band = source.band(index).ok_or(DriverError::BandOutOfRange {
                index,
                count: band_count,
            })?;
            if band.data_type() != data_type && strict {
                return Err(DriverError::Other(format!(
                    "band {} is {}, JRAS requires a single data type",
                    index,
                    band.data_type()
                )));
            }
            let raw = band.read_raster(Window::full(xsize, ysize))?;
            let size = band.data_type().size_bytes();
            let target = &mut doc.bands[index - 1];
            target.values = raw
                .chunks_exact(size)
                .map(|px| data_type.clamp(band.data_type().decode(px)))
                .collect();
            target.no_data = band.no_data_value();
            target.description = band.description();
        }

        self.store.save(path, &doc)?;
        tracing::debug!(path = %path.display(), bands = band_count, "create copy written");
        Ok(Some(Box::new(JrasDataset::from_document(
            self.store.clone(),
            path,
            Access::Update,
            doc,
            false,
        ))))
    }

    fn delete(&self, path: &Path) -> DriverResult<()> {
        if !self.writable {
            return Err(self.unsupported("Delete"));
        }
        self.store.remove(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(store: &Arc<RasterStore>) -> Box<dyn Dataset> {
        let driver = JrasDriver::new(store.clone());
        let mut ds = driver
            .create(Path::new("/vsimem/src.jras"), 3, 2, 2, DataType::Int16, &[])
            .unwrap()
            .unwrap();
        ds.set_geo_transform([10.0, 1.0, 0.0, 20.0, 0.0, -1.0]).unwrap();
        let band = ds.band_mut(2).unwrap();
        let mut raw = Vec::new();
        for v in [-3.0, -2.0, -1.0, 0.0, 1.0, 2.0] {
            DataType::Int16.encode(v, &mut raw);
        }
        band.write_raster(Window::full(3, 2), &raw).unwrap();
        band.set_no_data_value(-3.0).unwrap();
        ds
    }

    #[test]
    fn create_copy_preserves_pixels_and_georeferencing() {
        let store = Arc::new(RasterStore::new());
        let src = source(&store);
        let driver = JrasDriver::new(store.clone());
        let copy = driver
            .create_copy(Path::new("/vsimem/copy.jras"), src.as_ref(), false, &[])
            .unwrap()
            .unwrap();
        assert_eq!(copy.geo_transform(), src.geo_transform());
        let a = src.band(2).unwrap();
        let b = copy.band(2).unwrap();
        assert_eq!(a.checksum(None).unwrap(), b.checksum(None).unwrap());
        assert_eq!(b.no_data_value(), Some(-3.0));
    }

    #[test]
    fn refuse_option_declines_without_error() {
        let store = Arc::new(RasterStore::new());
        let driver = JrasDriver::new(store.clone());
        let result = driver
            .create(
                Path::new("/vsimem/x.jras"),
                1,
                1,
                1,
                DataType::Byte,
                &[OPTION_REFUSE.to_string()],
            )
            .unwrap();
        assert!(result.is_none());
        assert!(!store.exists(Path::new("/vsimem/x.jras")));
    }

    #[test]
    fn read_only_variant_lacks_create() {
        let driver = JrasDriver::read_only(Arc::new(RasterStore::new()));
        assert!(driver.has_capability(Capability::Open));
        assert!(!driver.has_capability(Capability::Create));
        assert!(!driver.has_capability(Capability::CreateCopy));
        let err = driver.create(Path::new("/vsimem/y.jras"), 1, 1, 1, DataType::Byte, &[]);
        assert!(matches!(err, Err(DriverError::Unsupported { .. })));
    }

    #[test]
    fn still_open_edits_are_invisible_until_close() {
        let store = Arc::new(RasterStore::new());
        let driver = JrasDriver::new(store.clone());
        let path = Path::new("/vsimem/lazy.jras");
        let mut ds = driver
            .create(path, 2, 1, 1, DataType::Byte, &[])
            .unwrap()
            .unwrap();
        ds.band_mut(1)
            .unwrap()
            .write_raster(Window::full(2, 1), &[5, 6])
            .unwrap();

        let before = driver.open(path, Access::ReadOnly).unwrap().unwrap();
        assert_eq!(before.band(1).unwrap().checksum(None).unwrap(), 0);

        ds.close().unwrap();
        let after = driver.open(path, Access::ReadOnly).unwrap().unwrap();
        assert_eq!(after.band(1).unwrap().checksum(None).unwrap(), 5 + 6);
    }

    #[test]
    fn delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.jras");
        let driver = JrasDriver::new(Arc::new(RasterStore::new()));
        let ds = driver
            .create(&path, 1, 1, 1, DataType::Byte, &[])
            .unwrap()
            .unwrap();
        ds.close().unwrap();
        assert!(path.exists());
        driver.delete(&path).unwrap();
        assert!(!path.exists());
    }
}
