//! hvol - hierarchical volumetric container decoding
//!
//! An async decoder for scientific volume files that store one or more
//! image channels as H.265 elementary streams inside a hierarchical
//! container (root attributes, a "Channels" group, one payload per channel).
//!
//! # Features
//!
//! - Read-only, by-path container navigation through the [`ContainerReader`]
//!   trait (bind your own backend, or use the built-in [`MemoryContainer`])
//! - Typed attribute extraction with an ordered unknown-attribute bag
//! - Decode orchestration through an external transcode engine (ffmpeg),
//!   with per-handle mutual exclusion and progress reporting
//! - 8-bit (`gray`) and 12-bit-in-16-bit little-endian (`gray12le`) output,
//!   returned as a tagged [`Samples`] value
//!
//! # Example
//!
//! ```rust,ignore
//! use hvol::Volume;
//!
//! # async fn example() -> hvol::Result<()> {
//! let volume = Volume::open("file:///data/stack.hvc").await?;
//! let attrs = volume.attributes()?;
//! for name in &attrs.channels.as_ref().unwrap().names {
//!     let samples = volume.decode16(name, &Default::default()).await?;
//!     println!("{}: {} samples", name, samples.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod attrs;
pub mod channel;
pub mod container;
pub mod engine;
pub mod error;
pub mod samples;
pub mod source;
pub mod utils;
pub mod volume;

// Re-exports
pub use attrs::{AttributeRecord, ChannelsRecord};
pub use channel::{locate_channel, ChannelDescriptor};
pub use container::{AttrValue, ContainerReader, GroupNode, MemoryContainer};
pub use engine::{CodecEngine, DecodeRequest, PixelFormat};
pub use error::{Result, VolumeError};
pub use samples::{Samples, VolumeDims};
pub use source::{create_source, ByteSource};
pub use volume::{DecodeOptions, Volume};

/// Version of the hvol implementation
pub const HVOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Magic number framing the built-in in-memory container encoding
pub const CONTAINER_MAGIC: &[u8; 4] = b"HVC\0";
