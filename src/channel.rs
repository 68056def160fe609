//! Channel location within a container
//!
//! Resolves a channel name to its node under the "Channels" group. A missing
//! name is a [`VolumeError::ChannelNotFound`], kept distinct from the
//! [`VolumeError::Format`] raised when the container itself lacks the group.

use crate::attrs::CHANNELS_GROUP;
use crate::container::ContainerReader;
use crate::error::{Result, VolumeError};
use bytes::Bytes;

/// Resolved location of one channel's compressed payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDescriptor {
    /// Channel name as enumerated under the "Channels" group
    pub name: String,

    /// The channel's `content_type` tag, if present
    pub content_type: Option<String>,

    /// Container path of the channel node
    pub path: String,
}

impl ChannelDescriptor {
    /// Read the channel's compressed payload bytes (the H.265 elementary
    /// stream stored as the node's dataset value).
    pub fn payload(&self, container: &dyn ContainerReader) -> Result<Bytes> {
        container.dataset(&self.path)
    }
}

/// Container path of a channel node
pub fn channel_path(name: &str) -> String {
    format!("{}/{}", CHANNELS_GROUP, name)
}

/// Resolve a channel name to its descriptor.
///
/// # Errors
///
/// - [`VolumeError::Format`] when the container has no "Channels" group
/// - [`VolumeError::ChannelNotFound`] when the group exists but the name
///   has no node
pub fn locate_channel(container: &dyn ContainerReader, name: &str) -> Result<ChannelDescriptor> {
    if !container.has_group(CHANNELS_GROUP) {
        return Err(VolumeError::Format(format!(
            "container has no {:?} group",
            CHANNELS_GROUP
        )));
    }

    let path = channel_path(name);
    if !container.has_group(&path) {
        return Err(VolumeError::channel_not_found(name));
    }

    let content_type = container
        .attribute(&path, "content_type")?
        .and_then(|v| v.as_str().map(|s| s.to_string()));

    Ok(ChannelDescriptor {
        name: name.to_string(),
        content_type,
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{AttrValue, GroupNode, MemoryContainer};

    fn container_with_channel() -> MemoryContainer {
        MemoryContainer::new(GroupNode::new().with_child(
            "Channels",
            GroupNode::new().with_child(
                "dapi",
                GroupNode::new()
                    .with_attr("content_type", AttrValue::Text("reference".to_string()))
                    .with_dataset(vec![0u8, 0, 1, 0x42]),
            ),
        ))
    }

    #[test]
    fn test_locate_existing_channel() {
        let container = container_with_channel();
        let descriptor = locate_channel(&container, "dapi").unwrap();
        assert_eq!(descriptor.name, "dapi");
        assert_eq!(descriptor.path, "Channels/dapi");
        assert_eq!(descriptor.content_type.as_deref(), Some("reference"));

        let payload = descriptor.payload(&container).unwrap();
        assert_eq!(&payload[..], &[0, 0, 1, 0x42]);
    }

    #[test]
    fn test_unknown_channel_is_not_found() {
        let container = container_with_channel();
        let err = locate_channel(&container, "gfp").unwrap_err();
        assert!(err.is_channel_not_found());
    }

    #[test]
    fn test_missing_group_is_format_error() {
        let container = MemoryContainer::new(GroupNode::new());
        let err = locate_channel(&container, "dapi").unwrap_err();
        assert!(matches!(err, VolumeError::Format(_)));
        assert!(!err.is_channel_not_found());
    }
}
