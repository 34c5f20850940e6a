//! Tolerance-based comparison of geotransforms and band statistics.
//!
//! Default tolerances scale with the expected values: a hundredth of the
//! pixel size for geotransforms and a thousandth of the value range for
//! statistics. The divisors are configurable through [`ToleranceDefaults`].

use geotest_driver::{GeoTransform, Statistics};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relative tolerance used by [`approx_equal`].
pub const APPROX_EQUAL_TOLERANCE: f64 = 1e-11;

/// Divisors and fixed epsilons behind the default tolerances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceDefaults {
    pub geotransform_divisor: f64,
    pub statistics_divisor: f64,
    /// Fixed epsilon for the geotransform check after a copy round trip.
    pub copy_geotransform_epsilon: f64,
}

impl Default for ToleranceDefaults {
    fn default() -> Self {
        Self {
            geotransform_divisor: 100.0,
            statistics_divisor: 1000.0,
            copy_geotransform_epsilon: 1e-8,
        }
    }
}

impl ToleranceDefaults {
    pub fn geotransform_epsilon(&self, expected: &GeoTransform) -> f64 {
        (expected[1].abs() + expected[2].abs()) / self.geotransform_divisor
    }

    pub fn statistics_epsilon(&self, expected: &Statistics) -> f64 {
        (expected.max - expected.min).abs() / self.statistics_divisor
    }
}

/// `(|gt[1]| + |gt[2]|) / 100`.
pub fn geotransform_epsilon(expected: &GeoTransform) -> f64 {
    ToleranceDefaults::default().geotransform_epsilon(expected)
}

/// Element-wise `|expected[i] - actual[i]| <= epsilon`.
pub fn compare_geotransform(expected: &GeoTransform, actual: &GeoTransform, epsilon: f64) -> bool {
    expected
        .iter()
        .zip(actual.iter())
        .all(|(e, a)| (e - a).abs() <= epsilon)
}

/// `|max - min| / 1000`.
pub fn statistics_epsilon(expected: &Statistics) -> f64 {
    ToleranceDefaults::default().statistics_epsilon(expected)
}

/// Textual NaN/Infinity probe: the rendered value contains `n`, `i` or `#`.
pub fn looks_non_finite(value: f64) -> bool {
    let text = value.to_string().to_lowercase();
    text.contains('n') || text.contains('i') || text.contains('#')
}

/// Why a statistics tuple was rejected. `index` follows min, max, mean, stddev.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatisticsMismatch {
    NonFinite {
        index: usize,
        value: f64,
    },
    OutOfTolerance {
        index: usize,
        expected: f64,
        actual: f64,
    },
}

impl fmt::Display for StatisticsMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFinite { value, .. } => {
                write!(f, "NaN or Infinite value encountered '{}'.", value)
            }
            Self::OutOfTolerance {
                index,
                expected,
                actual,
            } => write!(
                f,
                "{} is {} but expected {}",
                STATISTIC_NAMES[*index], actual, expected
            ),
        }
    }
}

const STATISTIC_NAMES: [&str; 4] = ["min", "max", "mean", "stddev"];

/// Compare field by field. A non-finite actual value is rejected before its
/// tolerance is even considered.
pub fn check_statistics(
    expected: &Statistics,
    actual: &Statistics,
    epsilon: f64,
) -> Result<(), StatisticsMismatch> {
    let expected = expected.as_array();
    for (index, value) in actual.as_array().into_iter().enumerate() {
        if looks_non_finite(value) {
            return Err(StatisticsMismatch::NonFinite { index, value });
        }
        if (value - expected[index]).abs() > epsilon {
            return Err(StatisticsMismatch::OutOfTolerance {
                index,
                expected: expected[index],
                actual: value,
            });
        }
    }
    Ok(())
}

pub fn compare_statistics(expected: &Statistics, actual: &Statistics, epsilon: f64) -> bool {
    check_statistics(expected, actual, epsilon).is_ok()
}

/// Relative equality within [`APPROX_EQUAL_TOLERANCE`]. Zero only equals zero.
pub fn approx_equal(a: f64, b: f64) -> bool {
    if a == 0.0 {
        return b == 0.0;
    }
    (b / a - 1.0).abs() <= APPROX_EQUAL_TOLERANCE
}
