//! Typed attribute extraction
//!
//! Flattens a container's root attributes and "Channels" group into an
//! [`AttributeRecord`]: a typed schema validated up front, plus an ordered
//! `extra` bag for attributes outside the schema. Records are derived fresh
//! on every extraction call and never cached across containers.

use crate::container::{AttrValue, ContainerReader};
use crate::error::{Result, VolumeError};
use serde::Serialize;

/// Name of the group holding one child per channel
pub const CHANNELS_GROUP: &str = "Channels";

/// Root attribute names covered by the typed schema
const IMAGE_SIZE: &str = "image_size";
const VOXEL_SIZE: &str = "voxel_size";
const CHANNEL_SPEC: &str = "channel_spec";

/// Flattened view of a container's attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttributeRecord {
    /// Nominal volume extent in voxels: `[width, height, depth]`
    pub image_size: Option<[f64; 3]>,

    /// Physical voxel extent: `[vx, vy, vz]`
    pub voxel_size: Option<[f64; 3]>,

    /// Channel layout tag (e.g. "r")
    pub channel_spec: Option<String>,

    /// Channel enumeration, absent when the container has no "Channels" group
    pub channels: Option<ChannelsRecord>,

    /// Root attributes outside the typed schema, in native order
    pub extra: Vec<(String, AttrValue)>,
}

/// Channel enumeration and per-channel geometry hints
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelsRecord {
    /// Channel names in the container's native child order
    pub names: Vec<String>,

    /// Content-type tags parallel to `names` (empty string when a channel
    /// carries no `content_type` attribute)
    pub content_types: Vec<String>,

    /// Frame count of the encoded streams
    pub frames: Option<u64>,

    /// Encoded plane height
    pub height: Option<u64>,

    /// Encoded plane width
    pub width: Option<u64>,

    /// Rows of codec padding below the nominal plane
    pub pad_bottom: Option<u64>,

    /// Columns of codec padding right of the nominal plane
    pub pad_right: Option<u64>,
}

impl AttributeRecord {
    /// Extract a record from an opened container.
    ///
    /// A well-formed container without a "Channels" group is not an error;
    /// `channels` is simply `None`. Channel names keep the container's native
    /// child ordering, without sorting or deduplication.
    pub fn from_container(container: &dyn ContainerReader) -> Result<Self> {
        let mut record = AttributeRecord::default();

        for (name, value) in container.attributes("")? {
            match name.as_str() {
                IMAGE_SIZE => record.image_size = Some(triple(&name, &value)?),
                VOXEL_SIZE => record.voxel_size = Some(triple(&name, &value)?),
                CHANNEL_SPEC => match value.as_str() {
                    Some(s) => record.channel_spec = Some(s.to_string()),
                    None => {
                        return Err(VolumeError::InvalidAttribute {
                            name,
                            message: "expected a string tag".to_string(),
                        })
                    }
                },
                _ => record.extra.push((name, value)),
            }
        }

        if container.has_group(CHANNELS_GROUP) {
            record.channels = Some(ChannelsRecord::from_container(container)?);
        }

        Ok(record)
    }

    /// Product of the nominal image extents, in voxels
    pub fn nominal_voxels(&self) -> Option<usize> {
        self.image_size
            .map(|[w, h, d]| (w as usize) * (h as usize) * (d as usize))
    }

    /// Render the record as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl ChannelsRecord {
    fn from_container(container: &dyn ContainerReader) -> Result<Self> {
        let mut record = ChannelsRecord::default();

        for (name, value) in container.attributes(CHANNELS_GROUP)? {
            let slot = match name.as_str() {
                "frames" => &mut record.frames,
                "height" => &mut record.height,
                "width" => &mut record.width,
                "pad_bottom" => &mut record.pad_bottom,
                "pad_right" => &mut record.pad_right,
                _ => continue,
            };
            *slot = Some(value.as_u64().ok_or_else(|| VolumeError::InvalidAttribute {
                name,
                message: "expected a non-negative integer".to_string(),
            })?);
        }

        for name in container.child_groups(CHANNELS_GROUP)? {
            let content_type = container
                .attribute(&format!("{}/{}", CHANNELS_GROUP, name), "content_type")?
                .and_then(|v| v.as_str().map(|s| s.to_string()))
                .unwrap_or_default();
            record.names.push(name);
            record.content_types.push(content_type);
        }

        Ok(record)
    }
}

fn triple(name: &str, value: &AttrValue) -> Result<[f64; 3]> {
    let vec = value
        .as_f64_vec()
        .ok_or_else(|| VolumeError::InvalidAttribute {
            name: name.to_string(),
            message: "expected a numeric vector".to_string(),
        })?;
    <[f64; 3]>::try_from(vec.as_slice()).map_err(|_| VolumeError::InvalidAttribute {
        name: name.to_string(),
        message: format!("expected 3 components, got {}", vec.len()),
    })
}
