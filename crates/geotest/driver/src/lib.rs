#![deny(unsafe_code)]
//! # geotest-driver
//!
//! The capability surface the conformance harness drives. A raster library
//! plugs in by implementing [`Driver`], [`Dataset`] and [`RasterBand`] and
//! registering its drivers with a [`DriverManager`].
//!
//! ## Key Types
//!
//! - [`Driver`]: Open / Create / CreateCopy / Delete for one format
//! - [`Dataset`] / [`RasterBand`]: handles returned by a driver
//! - [`DriverManager`]: registry, generic open, config options
//! - [`checksum_values`]: the reference pixel checksum

pub mod checksum;
pub mod error;
pub mod manager;
pub mod traits;
pub mod types;

pub use checksum::{checksum_values, CHECKSUM_PRIMES};
pub use error::{DriverError, DriverResult};
pub use manager::DriverManager;
pub use traits::{Dataset, Driver, RasterBand};
pub use types::{Access, Capability, DataType, GeoTransform, Statistics, Window};
