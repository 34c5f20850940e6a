#![deny(unsafe_code)]
//! # geotest-harness
//!
//! Conformance harness for raster drivers. A [`TestSpec`] declares a driver,
//! a sample file and the values the driver must reproduce; the
//! [`DriverConformanceChecker`] runs one protocol against it (open, create
//! copy, create, set-and-verify) and yields a [`TestOutcome`]. The
//! [`TestRunner`] executes test lists in order, isolating errors and panics,
//! and the [`ReportAggregator`] prints per-script summaries and the session
//! failure block.
//!
//! ```ignore
//! let mut manager = DriverManager::new();
//! geotest_jras::register(&mut manager);
//! let mut report = ReportAggregator::new(Arc::new(manager), HarnessConfig::from_env());
//! let failures = report.run_all(&["autotest/gcore"], &RunOptions::default())?;
//! ```

pub mod checker;
pub mod config;
pub mod context;
pub mod error;
pub mod outcome;
pub mod report;
pub mod runner;
pub mod scratch;
pub mod script;
pub mod spec;
pub mod srs;
pub mod tolerance;
pub mod utilities;

pub use checker::{CreateCopyOptions, CreateOptions, DriverConformanceChecker, OpenChecks};
pub use config::HarnessConfig;
pub use context::{FailureEntry, FailureSummary, RunContext, RunCounters, SummaryLine};
pub use error::{HarnessError, HarnessResult};
pub use outcome::TestOutcome;
pub use report::{ReportAggregator, RunOptions};
pub use runner::{TestCase, TestFn, TestRunner};
pub use scratch::{clean_tmp, ScratchDataset};
pub use script::{CheckKind, ScriptManifest, TestEntry};
pub use spec::TestSpec;
pub use srs::{equal_srs_from_wkt, user_srs_to_wkt, SpatialReference, SrsError};
pub use tolerance::{approx_equal, ToleranceDefaults};
pub use utilities::UtilityLocator;
