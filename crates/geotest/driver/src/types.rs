//! Value types shared between drivers and the harness.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Affine pixel/line to georeferenced mapping, in library order:
/// `[origin_x, pixel_width, row_rotation, origin_y, column_rotation, pixel_height]`.
pub type GeoTransform = [f64; 6];

/// Access mode requested when opening a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    ReadOnly,
    Update,
}

/// Optional operations a driver may or may not provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    Open,
    Create,
    CreateCopy,
    Delete,
    /// Datasets can live in the in-process memory filesystem.
    VirtualIo,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::Open,
        Capability::Create,
        Capability::CreateCopy,
        Capability::Delete,
        Capability::VirtualIo,
    ];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Open => write!(f, "Open"),
            Capability::Create => write!(f, "Create"),
            Capability::CreateCopy => write!(f, "CreateCopy"),
            Capability::Delete => write!(f, "Delete"),
            Capability::VirtualIo => write!(f, "VirtualIO"),
        }
    }
}

/// Pixel data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Byte,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl DataType {
    /// Size of one pixel in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            DataType::Byte => 1,
            DataType::UInt16 | DataType::Int16 => 2,
            DataType::UInt32 | DataType::Int32 | DataType::Float32 => 4,
            DataType::Float64 => 8,
        }
    }

    pub fn is_floating(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Bring an arbitrary value into the representable range of this type.
    ///
    /// Integer types round to nearest and saturate; `Float32` loses precision
    /// the same way a stored pixel would.
    pub fn clamp(self, value: f64) -> f64 {
        match self {
            DataType::Byte => saturate(value, u8::MIN as f64, u8::MAX as f64),
            DataType::UInt16 => saturate(value, u16::MIN as f64, u16::MAX as f64),
            DataType::Int16 => saturate(value, i16::MIN as f64, i16::MAX as f64),
            DataType::UInt32 => saturate(value, u32::MIN as f64, u32::MAX as f64),
            DataType::Int32 => saturate(value, i32::MIN as f64, i32::MAX as f64),
            DataType::Float32 => value as f32 as f64,
            DataType::Float64 => value,
        }
    }

    /// Append the little-endian encoding of `value` to `out`.
    pub fn encode(self, value: f64, out: &mut Vec<u8>) {
        let value = self.clamp(value);
        match self {
            DataType::Byte => out.push(value as u8),
            DataType::UInt16 => out.extend_from_slice(&(value as u16).to_le_bytes()),
            DataType::Int16 => out.extend_from_slice(&(value as i16).to_le_bytes()),
            DataType::UInt32 => out.extend_from_slice(&(value as u32).to_le_bytes()),
            DataType::Int32 => out.extend_from_slice(&(value as i32).to_le_bytes()),
            DataType::Float32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
            DataType::Float64 => out.extend_from_slice(&value.to_le_bytes()),
        }
    }

    /// Decode one pixel. `bytes` must hold exactly [`size_bytes`](Self::size_bytes) bytes.
    pub fn decode(self, bytes: &[u8]) -> f64 {
        match self {
            DataType::Byte => bytes[0] as f64,
            DataType::UInt16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            DataType::Int16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            DataType::UInt32 => {
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            DataType::Int32 => {
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            DataType::Float32 => {
                f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            DataType::Float64 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes[..8]);
                f64::from_le_bytes(raw)
            }
        }
    }
}

fn saturate(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.round().clamp(min, max)
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Byte => "Byte",
            DataType::UInt16 => "UInt16",
            DataType::Int16 => "Int16",
            DataType::UInt32 => "UInt32",
            DataType::Int32 => "Int32",
            DataType::Float32 => "Float32",
            DataType::Float64 => "Float64",
        };
        write!(f, "{}", name)
    }
}

/// A rectangular pixel window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Window {
    pub xoff: usize,
    pub yoff: usize,
    pub xsize: usize,
    pub ysize: usize,
}

impl Window {
    pub fn new(xoff: usize, yoff: usize, xsize: usize, ysize: usize) -> Self {
        Self {
            xoff,
            yoff,
            xsize,
            ysize,
        }
    }

    /// The whole raster.
    pub fn full(xsize: usize, ysize: usize) -> Self {
        Self::new(0, 0, xsize, ysize)
    }

    pub fn pixel_count(&self) -> usize {
        self.xsize * self.ysize
    }

    /// True when the window lies inside a `width` x `height` raster.
    pub fn fits(&self, width: usize, height: usize) -> bool {
        let fits_in = |off: usize, size: usize, limit: usize| {
            off.checked_add(size).is_some_and(|end| end <= limit)
        };
        fits_in(self.xoff, self.xsize, width) && fits_in(self.yoff, self.ysize, height)
    }
}

/// Band statistics as reported by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl Statistics {
    pub fn new(min: f64, max: f64, mean: f64, std_dev: f64) -> Self {
        Self {
            min,
            max,
            mean,
            std_dev,
        }
    }

    /// Fields in library order: min, max, mean, stddev.
    pub fn as_array(&self) -> [f64; 4] {
        [self.min, self.max, self.mean, self.std_dev]
    }
}

impl From<[f64; 4]> for Statistics {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}
