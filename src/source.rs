//! Byte sources for opening containers
//!
//! A source fetches the whole container into memory; parsing only starts
//! after the fetch succeeded, so fetch failures surface as
//! [`VolumeError::Source`] before any format validation runs.

use crate::error::{Result, VolumeError};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Source scheme types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceScheme {
    /// Local file system
    File,
    /// HTTP or HTTPS endpoint
    Http,
}

impl SourceScheme {
    /// Parse the source scheme from a URL
    pub fn from_url(url: &str) -> Result<Self> {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end];
            match scheme {
                "file" => Ok(SourceScheme::File),
                "http" | "https" => Ok(SourceScheme::Http),
                _ => Err(VolumeError::InvalidUrl(format!(
                    "Unknown scheme: {}",
                    scheme
                ))),
            }
        } else {
            // Assume file system if no scheme
            Ok(SourceScheme::File)
        }
    }
}

/// Trait for fetching container bytes from a storage location
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Fetch the complete byte buffer
    async fn fetch(&self) -> Result<Bytes>;

    /// Get the scheme type
    fn scheme(&self) -> SourceScheme;
}

/// File system byte source
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Create a new file system source
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ByteSource for FileSource {
    async fn fetch(&self) -> Result<Bytes> {
        let data = fs::read(&self.path).await.map_err(|e| {
            VolumeError::Source(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        Ok(Bytes::from(data))
    }

    fn scheme(&self) -> SourceScheme {
        SourceScheme::File
    }
}

/// HTTP byte source
#[cfg(feature = "http-client")]
pub struct HttpSource {
    url: String,
}

#[cfg(feature = "http-client")]
impl HttpSource {
    /// Create a new HTTP source
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[cfg(feature = "http-client")]
#[async_trait]
impl ByteSource for HttpSource {
    async fn fetch(&self) -> Result<Bytes> {
        let response = reqwest::get(&self.url)
            .await
            .map_err(|e| VolumeError::Source(format!("request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VolumeError::Source(format!(
                "request to {} returned status {}",
                self.url, status
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| VolumeError::Source(format!("failed to read response body: {}", e)))
    }

    fn scheme(&self) -> SourceScheme {
        SourceScheme::Http
    }
}

/// Parse a URL and create the appropriate byte source
///
/// HTTP sources require the `http-client` feature; without it, http(s) URLs
/// are rejected here rather than at fetch time.
pub fn create_source(url: &str) -> Result<Box<dyn ByteSource>> {
    let scheme = SourceScheme::from_url(url)?;

    match scheme {
        SourceScheme::File => {
            // Extract path from file:// URL or use as-is
            let path = url.strip_prefix("file://").unwrap_or(url);
            Ok(Box::new(FileSource::new(path)))
        }
        #[cfg(feature = "http-client")]
        SourceScheme::Http => Ok(Box::new(HttpSource::new(url))),
        #[cfg(not(feature = "http-client"))]
        SourceScheme::Http => Err(VolumeError::InvalidUrl(format!(
            "HTTP source {} requires the http-client feature",
            url
        ))),
    }
}
