//! Volume access - main API for opening containers and decoding channels

use crate::attrs::AttributeRecord;
use crate::channel::locate_channel;
use crate::container::{ContainerReader, MemoryContainer};
use crate::engine::{CodecEngine, DecodeRequest, PixelFormat, ProgressFn};
use crate::error::{Result, VolumeError};
use crate::samples::Samples;
use crate::source::create_source;
use std::sync::Arc;
use uuid::Uuid;

/// Options shared by the decode entry points
#[derive(Clone, Default)]
pub struct DecodeOptions {
    /// Pre-initialized engine handle to reuse. Callers decoding many
    /// channels or files should supply one so initialization is paid once;
    /// without it, each call initializes a fresh handle.
    pub engine: Option<Arc<CodecEngine>>,

    /// Fractional progress callback. Without one, progress is logged as a
    /// human-readable percentage.
    pub progress: Option<Arc<ProgressFn>>,
}

impl DecodeOptions {
    /// Default options: fresh engine per call, logged progress
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse a pre-initialized engine handle
    pub fn with_engine(mut self, engine: Arc<CodecEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Receive fractional progress through a callback
    pub fn with_progress(mut self, progress: Arc<ProgressFn>) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// An opened volumetric container
///
/// Read-only for its entire lifetime. Each instance carries a random
/// identity that is mixed into engine staging names, so concurrent decodes
/// from different volumes sharing one engine handle cannot collide.
pub struct Volume {
    id: Uuid,
    container: Arc<dyn ContainerReader>,
}

impl std::fmt::Debug for Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Volume").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Volume {
    /// Open a volume from a URL (`file://`, bare path, or `http(s)://` with
    /// the `http-client` feature)
    pub async fn open(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let source = create_source(&url)?;
        let bytes = source.fetch().await?;
        tracing::debug!(url = %url, bytes = bytes.len(), "fetched container");
        Self::from_bytes(&bytes)
    }

    /// Open a byte buffer as a volume
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self::with_container(Arc::new(MemoryContainer::from_bytes(
            bytes,
        )?)))
    }

    /// Wrap an already-opened container backend
    pub fn with_container(container: Arc<dyn ContainerReader>) -> Self {
        Self {
            id: Uuid::new_v4(),
            container,
        }
    }

    /// Identity used to namespace this volume's staged engine inputs
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The underlying container
    pub fn container(&self) -> &dyn ContainerReader {
        self.container.as_ref()
    }

    /// Extract the attribute record, derived fresh on each call
    pub fn attributes(&self) -> Result<AttributeRecord> {
        AttributeRecord::from_container(self.container.as_ref())
    }

    /// Decode one channel into the requested pixel format.
    ///
    /// Resolves the channel, stages its payload into the engine, transcodes
    /// to raw video, and reinterprets the result as [`Samples`]. The decoded
    /// buffer may exceed the nominal `image_size` product because of codec
    /// block alignment; only an undersized buffer is rejected.
    pub async fn decode(
        &self,
        channel: &str,
        format: PixelFormat,
        options: &DecodeOptions,
    ) -> Result<Samples> {
        let descriptor = locate_channel(self.container.as_ref(), channel)?;
        let payload = descriptor.payload(self.container.as_ref())?;
        let attrs = self.attributes()?;

        let engine = match &options.engine {
            Some(engine) => Arc::clone(engine),
            None => Arc::new(CodecEngine::initialize().await?),
        };

        let mut request = DecodeRequest::new(self.staged_input_name(channel), format);
        if let Some(frames) = attrs.channels.as_ref().and_then(|c| c.frames) {
            request = request.with_expected_frames(frames);
        }

        tracing::debug!(channel, format = %format, payload = payload.len(), "decoding channel");
        let raw = engine
            .decode(&request, &payload, options.progress.as_deref())
            .await?;

        if let Some(nominal) = attrs.nominal_voxels() {
            let required = nominal * format.bytes_per_sample();
            if raw.len() < required {
                return Err(VolumeError::InvalidOutput(format!(
                    "decoded buffer holds {} bytes, nominal volume needs at least {}",
                    raw.len(),
                    required
                )));
            }
        }

        Samples::from_raw(raw, format)
    }

    /// Decode one channel as 8-bit samples (pixel format `gray`)
    pub async fn decode8(&self, channel: &str, options: &DecodeOptions) -> Result<Vec<u8>> {
        self.decode(channel, PixelFormat::Gray, options)
            .await?
            .into_u8()
            .ok_or_else(|| VolumeError::InvalidOutput("expected 8-bit samples".to_string()))
    }

    /// Decode one channel as 16-bit samples (pixel format `gray12le`)
    pub async fn decode16(&self, channel: &str, options: &DecodeOptions) -> Result<Vec<u16>> {
        self.decode(channel, PixelFormat::Gray12Le, options)
            .await?
            .into_u16()
            .ok_or_else(|| VolumeError::InvalidOutput("expected 16-bit samples".to_string()))
    }

    /// Decode every channel in the container, sharing one engine handle.
    ///
    /// Returns one `(name, result)` entry per channel in native order. A
    /// failed channel yields its error in place and does not abort the
    /// remaining channels.
    pub async fn decode_channels(
        &self,
        format: PixelFormat,
        options: &DecodeOptions,
    ) -> Result<Vec<(String, Result<Samples>)>> {
        let attrs = self.attributes()?;
        let channels = attrs.channels.ok_or_else(|| {
            VolumeError::Format("container has no \"Channels\" group".to_string())
        })?;

        let engine = match &options.engine {
            Some(engine) => Arc::clone(engine),
            None => Arc::new(CodecEngine::initialize().await?),
        };
        let shared = DecodeOptions {
            engine: Some(engine),
            progress: options.progress.clone(),
        };

        let decodes = channels.names.iter().map(|name| {
            let shared = &shared;
            async move { (name.clone(), self.decode(name, format, shared).await) }
        });
        Ok(futures::future::join_all(decodes).await)
    }

    /// Summary statistics about the volume
    pub fn stats(&self) -> Result<VolumeStats> {
        let attrs = self.attributes()?;
        Ok(VolumeStats {
            channels: attrs.channels.as_ref().map_or(0, |c| c.names.len()),
            nominal_voxels: attrs.nominal_voxels(),
            channel_spec: attrs.channel_spec,
        })
    }

    fn staged_input_name(&self, channel: &str) -> String {
        let safe: String = channel
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{}-{}.h265", self.id, safe)
    }
}

/// Volume statistics
#[derive(Debug, Clone)]
pub struct VolumeStats {
    pub channels: usize,
    pub nominal_voxels: Option<usize>,
    pub channel_spec: Option<String>,
}

impl VolumeStats {
    pub fn summary(&self) -> String {
        format!(
            "{} channel(s), {} nominal voxels, channel spec {:?}",
            self.channels,
            self.nominal_voxels
                .map_or_else(|| "unknown".to_string(), |v| v.to_string()),
            self.channel_spec.as_deref().unwrap_or("none"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{AttrValue, GroupNode, MemoryContainer};
    use tempfile::TempDir;

    fn sample_container() -> MemoryContainer {
        MemoryContainer::new(
            GroupNode::new()
                .with_attr(
                    "image_size",
                    AttrValue::FloatVec(vec![64.0, 64.0, 8.0]),
                )
                .with_attr("channel_spec", AttrValue::Text("r".to_string()))
                .with_child(
                    "Channels",
                    GroupNode::new().with_attr("frames", AttrValue::Int(8)).with_child(
                        "ref",
                        GroupNode::new()
                            .with_attr("content_type", AttrValue::Text("reference".to_string()))
                            .with_dataset(vec![0u8; 16]),
                    ),
                ),
        )
    }

    #[tokio::test]
    async fn test_open_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stack.hvc");
        let bytes = sample_container().to_bytes().unwrap();
        tokio::fs::write(&path, &bytes).await.unwrap();

        let volume = Volume::open(path.to_str().unwrap()).await.unwrap();
        let attrs = volume.attributes().unwrap();
        assert_eq!(attrs.channels.unwrap().names, vec!["ref"]);
    }

    #[tokio::test]
    async fn test_open_missing_file_is_source_error() {
        let err = Volume::open("/nonexistent/stack.hvc").await.unwrap_err();
        assert!(matches!(err, VolumeError::Source(_)));
    }

    #[tokio::test]
    async fn test_open_garbage_bytes_is_format_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stack.hvc");
        tokio::fs::write(&path, b"not a container").await.unwrap();

        let err = Volume::open(path.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, VolumeError::Format(_)));
    }

    #[tokio::test]
    async fn test_unknown_channel_fails_before_engine_setup() {
        // Resolution happens before any engine work, so this must fail with
        // ChannelNotFound even on hosts without a transcoder installed.
        let volume = Volume::with_container(Arc::new(sample_container()));
        let err = volume
            .decode("missing", PixelFormat::Gray, &DecodeOptions::new())
            .await
            .unwrap_err();
        assert!(err.is_channel_not_found());
    }

    #[tokio::test]
    async fn test_decode_without_channels_group_is_format_error() {
        let volume = Volume::with_container(Arc::new(MemoryContainer::new(GroupNode::new())));
        let err = volume
            .decode_channels(PixelFormat::Gray, &DecodeOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, VolumeError::Format(_)));
    }

    #[test]
    fn test_staged_names_unique_per_volume() {
        let container = Arc::new(sample_container());
        let a = Volume::with_container(container.clone());
        let b = Volume::with_container(container);

        assert_ne!(
            a.staged_input_name("ref"),
            b.staged_input_name("ref")
        );
        // Path separators in channel names cannot escape the staging dir
        assert!(!a.staged_input_name("../etc/passwd").contains('/'));
        assert!(a.staged_input_name("ref").ends_with(".h265"));
    }

    #[test]
    fn test_attributes_derived_fresh() {
        let volume = Volume::with_container(Arc::new(sample_container()));
        let first = volume.attributes().unwrap();
        let second = volume.attributes().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_stats_summary() {
        let volume = Volume::with_container(Arc::new(sample_container()));
        let stats = volume.stats().unwrap();
        assert_eq!(stats.channels, 1);
        assert_eq!(stats.nominal_voxels, Some(64 * 64 * 8));
        assert!(stats.summary().contains("1 channel"));
    }
}
