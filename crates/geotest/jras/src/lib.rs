#![deny(unsafe_code)]
//! # geotest-jras
//!
//! A small raster format ("JRAS") whose datasets are JSON documents, either
//! on disk or in the in-process memory filesystem (`/vsimem/...`). It gives
//! the harness a real Open/Create/CreateCopy/Delete target without linking a
//! native library.
//!
//! Writes are buffered in the open handle and flushed on close or drop, so a
//! still-open handle and a reopened one can legitimately disagree.

pub mod dataset;
pub mod document;
pub mod driver;
pub mod store;

pub use dataset::{JrasBand, JrasDataset};
pub use document::{BandDocument, RasterDocument, FORMAT_TAG};
pub use driver::JrasDriver;
pub use store::{RasterStore, MEMORY_PREFIX};

use geotest_driver::DriverManager;
use std::sync::Arc;

/// Register the JRAS driver with a fresh store and return that store.
pub fn register(manager: &mut DriverManager) -> Arc<RasterStore> {
    let store = Arc::new(RasterStore::new());
    manager.register(Arc::new(JrasDriver::new(store.clone())));
    store
}
