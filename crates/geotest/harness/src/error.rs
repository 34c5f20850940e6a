//! Error types for the conformance harness.
//!
//! An `Err` escaping a check is not an ordinary test failure: the runner
//! reports it as a blowup. Anticipated mismatches travel as
//! [`TestOutcome::Fail`](crate::outcome::TestOutcome::Fail) instead.

use crate::srs::SrsError;
use geotest_driver::DriverError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the harness itself or passed through from a driver.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("spatial reference error: {0}")]
    Srs(#[from] SrsError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A script manifest is not valid TOML or does not match the schema.
    #[error("invalid script manifest: {0}")]
    Manifest(#[from] toml::de::Error),

    /// A manifest entry lacks a field its check needs.
    #[error("test {test} is missing required field `{field}`")]
    MissingField { test: String, field: &'static str },

    #[error("failed to read {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    /// A test panicked; the payload message is kept.
    #[error("test panicked: {0}")]
    Panic(String),
}

/// Convenience result type for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Render an error and all of its sources on one line.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let message = inner.to_string();
        // thiserror's `{0}` formatting already embeds the immediate source.
        if !text.ends_with(&message) {
            text.push_str(": ");
            text.push_str(&message);
        }
        source = inner.source();
    }
    text
}
