//! On-disk JRAS document.

use geotest_driver::{DataType, GeoTransform};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value of the leading `format` field; `identify` looks for it.
pub const FORMAT_TAG: &str = "JRAS";

/// A complete raster dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterDocument {
    pub format: String,
    pub xsize: usize,
    pub ysize: usize,
    pub data_type: DataType,
    #[serde(default)]
    pub geo_transform: Option<GeoTransform>,
    #[serde(default)]
    pub projection: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, BTreeMap<String, String>>,
    pub bands: Vec<BandDocument>,
}

/// Pixel values are stored row-major, already clamped to `data_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandDocument {
    #[serde(with = "nan_as_null")]
    pub values: Vec<f64>,
    #[serde(default)]
    pub no_data: Option<f64>,
    #[serde(default)]
    pub description: String,
}

impl RasterDocument {
    /// A zero-filled raster.
    pub fn new(xsize: usize, ysize: usize, bands: usize, data_type: DataType) -> Self {
        Self {
            format: FORMAT_TAG.to_string(),
            xsize,
            ysize,
            data_type,
            geo_transform: None,
            projection: String::new(),
            metadata: BTreeMap::new(),
            bands: (0..bands)
                .map(|_| BandDocument {
                    values: vec![0.0; xsize * ysize],
                    no_data: None,
                    description: String::new(),
                })
                .collect(),
        }
    }

    /// Check the structural invariants a loaded document must hold.
    pub fn validate(&self) -> Result<(), String> {
        if self.format != FORMAT_TAG {
            return Err(format!("unexpected format tag {:?}", self.format));
        }
        let expected = self.xsize * self.ysize;
        for (i, band) in self.bands.iter().enumerate() {
            if band.values.len() != expected {
                return Err(format!(
                    "band {} holds {} values, expected {}",
                    i + 1,
                    band.values.len(),
                    expected
                ));
            }
        }
        Ok(())
    }

    /// Metadata key under which the default domain is stored.
    pub fn domain_key(domain: Option<&str>) -> String {
        domain.unwrap_or("").to_string()
    }
}

/// JSON has no NaN; non-finite pixels are written as `null` and read back as NaN.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(
            values
                .iter()
                .map(|v| if v.is_finite() { Some(*v) } else { None }),
        )
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let raw: Vec<Option<f64>> = Vec::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_is_valid() {
        let doc = RasterDocument::new(4, 3, 2, DataType::Int16);
        assert!(doc.validate().is_ok());
        assert_eq!(doc.bands.len(), 2);
        assert_eq!(doc.bands[0].values.len(), 12);
    }

    #[test]
    fn format_tag_serializes_first() {
        let doc = RasterDocument::new(1, 1, 1, DataType::Byte);
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.starts_with("{\"format\":\"JRAS\""));
    }

    #[test]
    fn nan_pixels_survive_json() {
        let mut doc = RasterDocument::new(2, 1, 1, DataType::Float32);
        doc.bands[0].values[1] = f64::NAN;
        let json = serde_json::to_string(&doc).unwrap();
        let back: RasterDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back.bands[0].values[0], 0.0);
        assert!(back.bands[0].values[1].is_nan());
    }

    #[test]
    fn short_band_is_rejected() {
        let mut doc = RasterDocument::new(2, 2, 1, DataType::Byte);
        doc.bands[0].values.pop();
        assert!(doc.validate().unwrap_err().contains("band 1"));
    }
}
