use std::path::PathBuf;

/// Errors raised by a driver implementation.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("dataset not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("dataset {} is opened read-only", .0.display())]
    ReadOnly(PathBuf),
    #[error("band {index} out of range (dataset has {count} bands)")]
    BandOutOfRange { index: usize, count: usize },
    #[error("window {xoff},{yoff} {xsize}x{ysize} exceeds raster {width}x{height}")]
    WindowOutOfRange {
        xoff: usize,
        yoff: usize,
        xsize: usize,
        ysize: usize,
        width: usize,
        height: usize,
    },
    #[error("buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error("operation not supported by driver {driver}: {operation}")]
    Unsupported { driver: String, operation: String },
    #[error("no valid pixels in band")]
    NoValidPixels,
    #[error("corrupt dataset {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("driver error: {0}")]
    Other(String),
}

/// Convenience result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_out_of_range_display() {
        let e = DriverError::WindowOutOfRange {
            xoff: 5,
            yoff: 5,
            xsize: 20,
            ysize: 20,
            width: 20,
            height: 20,
        };
        assert!(e.to_string().contains("5,5 20x20"));
    }

    #[test]
    fn unsupported_display() {
        let e = DriverError::Unsupported {
            driver: "JRAS".into(),
            operation: "Create".into(),
        };
        assert!(e.to_string().contains("JRAS"));
        assert!(e.to_string().contains("Create"));
    }
}
