//! Decoded sample representations
//!
//! The decode result is a tagged union over sample width, so both output
//! modes share one orchestrator contract. Decoded planes may carry codec
//! block-alignment padding beyond the nominal image size; [`VolumeDims`]
//! captures that geometry and [`crop_to_nominal`] strips it.

use crate::attrs::AttributeRecord;
use crate::engine::PixelFormat;
use crate::error::{Result, VolumeError};
use crate::utils::bytes_to_u16_le;
use bytes::Bytes;
use ndarray::Array3;

/// Caller-facing samples decoded from one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Samples {
    /// 8-bit grayscale, one byte per sample
    U8(Vec<u8>),
    /// 12-bit grayscale carried in 16-bit slots
    U16(Vec<u16>),
}

impl Samples {
    /// Reinterpret a raw engine buffer as samples.
    ///
    /// `Gray` output passes through unmodified: the codec's mapping from the
    /// source bit depth down to 8 bits is deterministic but codec-defined,
    /// and it is not re-derived or corrected here. `Gray12Le` output is
    /// reinterpreted as little-endian 16-bit pairs with no value scaling, so
    /// the original ≤12-bit dynamic range is preserved rather than stretched
    /// to the full 16-bit range.
    pub fn from_raw(raw: Bytes, format: PixelFormat) -> Result<Self> {
        match format {
            PixelFormat::Gray => Ok(Samples::U8(raw.to_vec())),
            PixelFormat::Gray12Le => Ok(Samples::U16(bytes_to_u16_le(&raw)?)),
        }
    }

    /// The pixel format this value was decoded with
    pub fn pixel_format(&self) -> PixelFormat {
        match self {
            Samples::U8(_) => PixelFormat::Gray,
            Samples::U16(_) => PixelFormat::Gray12Le,
        }
    }

    /// Number of samples (not bytes)
    pub fn len(&self) -> usize {
        match self {
            Samples::U8(v) => v.len(),
            Samples::U16(v) => v.len(),
        }
    }

    /// Whether the value holds no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow as 8-bit samples
    pub fn as_u8(&self) -> Option<&[u8]> {
        match self {
            Samples::U8(v) => Some(v),
            Samples::U16(_) => None,
        }
    }

    /// Borrow as 16-bit samples
    pub fn as_u16(&self) -> Option<&[u16]> {
        match self {
            Samples::U8(_) => None,
            Samples::U16(v) => Some(v),
        }
    }

    /// Consume into 8-bit samples
    pub fn into_u8(self) -> Option<Vec<u8>> {
        match self {
            Samples::U8(v) => Some(v),
            Samples::U16(_) => None,
        }
    }

    /// Consume into 16-bit samples
    pub fn into_u16(self) -> Option<Vec<u16>> {
        match self {
            Samples::U8(_) => None,
            Samples::U16(v) => Some(v),
        }
    }
}

/// Geometry of a decoded buffer: nominal extent plus codec padding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VolumeDims {
    /// Nominal plane width in voxels
    pub width: usize,
    /// Nominal plane height in voxels
    pub height: usize,
    /// Number of planes
    pub depth: usize,
    /// Columns of padding right of the nominal plane
    pub pad_right: usize,
    /// Rows of padding below the nominal plane
    pub pad_bottom: usize,
}

impl VolumeDims {
    /// Unpadded dimensions
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            width,
            height,
            depth,
            pad_right: 0,
            pad_bottom: 0,
        }
    }

    /// Set the codec padding
    pub fn with_padding(mut self, pad_right: usize, pad_bottom: usize) -> Self {
        self.pad_right = pad_right;
        self.pad_bottom = pad_bottom;
        self
    }

    /// Derive dimensions from an extracted attribute record, combining
    /// `image_size` with the "Channels" group padding hints
    pub fn from_record(record: &AttributeRecord) -> Option<Self> {
        let [w, h, d] = record.image_size?;
        let mut dims = Self::new(w as usize, h as usize, d as usize);
        if let Some(channels) = &record.channels {
            dims.pad_right = channels.pad_right.unwrap_or(0) as usize;
            dims.pad_bottom = channels.pad_bottom.unwrap_or(0) as usize;
        }
        Some(dims)
    }

    /// Plane width as decoded, including padding
    pub fn padded_width(&self) -> usize {
        self.width + self.pad_right
    }

    /// Plane height as decoded, including padding
    pub fn padded_height(&self) -> usize {
        self.height + self.pad_bottom
    }

    /// Voxel count of the nominal volume
    pub fn nominal_voxels(&self) -> usize {
        self.width * self.height * self.depth
    }

    /// Voxel count of the decoded volume, including padding
    pub fn padded_voxels(&self) -> usize {
        self.padded_width() * self.padded_height() * self.depth
    }
}

/// Crop a decoded plane stack down to its nominal extent.
///
/// `data` is indexed as depth-major planes of `padded_width x padded_height`
/// samples; the result is a `(depth, height, width)` array without the
/// padding rows/columns. The buffer is only required to be at least
/// `padded_voxels` long (decoders may round sizes up further).
pub fn crop_to_nominal<T: Copy>(data: &[T], dims: &VolumeDims) -> Result<Array3<T>> {
    if data.len() < dims.padded_voxels() {
        return Err(VolumeError::InvalidOutput(format!(
            "buffer holds {} samples, padded volume needs {}",
            data.len(),
            dims.padded_voxels()
        )));
    }

    let padded_width = dims.padded_width();
    let plane = padded_width * dims.padded_height();
    let mut out = Vec::with_capacity(dims.nominal_voxels());

    for z in 0..dims.depth {
        for y in 0..dims.height {
            let row = z * plane + y * padded_width;
            out.extend_from_slice(&data[row..row + dims.width]);
        }
    }

    Array3::from_shape_vec((dims.depth, dims.height, dims.width), out)
        .map_err(|e| VolumeError::InvalidOutput(e.to_string()))
}
