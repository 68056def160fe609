//! External codec engine orchestration
//!
//! The engine bridges a compressed H.265 payload to raw pixel bytes through
//! an external transcoder (ffmpeg). A handle owns a private staging directory
//! that acts as the engine's addressable input/output space; the
//! staging -> transcode -> readback sequence runs under an async mutex, so
//! concurrent decodes on one handle serialize instead of interleaving.

use crate::error::{CodecStage, Result, VolumeError};
use crate::utils::format_bytes;
use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;

/// Pixel layout requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Unsigned 8-bit grayscale
    Gray,
    /// 12-bit grayscale stored in 16-bit little-endian slots
    Gray12Le,
}

impl PixelFormat {
    /// Format tag understood by the transcoder
    pub fn engine_name(&self) -> &'static str {
        match self {
            PixelFormat::Gray => "gray",
            PixelFormat::Gray12Le => "gray12le",
        }
    }

    /// Bytes occupied by one sample in the decoded buffer
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            PixelFormat::Gray => 1,
            PixelFormat::Gray12Le => 2,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.engine_name())
    }
}

/// Fractional decode progress callback
pub type ProgressFn = dyn Fn(f64) + Send + Sync;

/// One staged decode: input naming, target format, and a frame-count hint
#[derive(Debug, Clone)]
pub struct DecodeRequest {
    /// Name for the staged input inside the engine's input space; must be
    /// unique across concurrent decodes sharing a handle
    pub input_name: String,

    /// Requested output pixel layout
    pub pixel_format: PixelFormat,

    /// Total frame count, used to turn frame progress into a fraction
    pub expected_frames: Option<u64>,
}

impl DecodeRequest {
    /// Create a request for a staged input name and target format
    pub fn new(input_name: impl Into<String>, pixel_format: PixelFormat) -> Self {
        Self {
            input_name: input_name.into(),
            pixel_format,
            expected_frames: None,
        }
    }

    /// Set the frame-count hint
    pub fn with_expected_frames(mut self, frames: u64) -> Self {
        self.expected_frames = Some(frames);
        self
    }
}

/// Handle to the external transcode engine
///
/// Long-lived and shareable behind an `Arc`: initialization (binary lookup,
/// version probe, staging directory) is paid once, and every decode on the
/// handle reuses it. After a failed decode the handle stays usable for other
/// channels, but its state is reported as suspect; callers that want a clean
/// retry should initialize a fresh handle.
#[derive(Debug)]
pub struct CodecEngine {
    binary: PathBuf,
    staging: TempDir,
    gate: Mutex<()>,
    last_failure: RwLock<Option<String>>,
}

impl CodecEngine {
    /// Binary name looked up in `PATH` by [`CodecEngine::initialize`]
    pub const DEFAULT_BINARY: &'static str = "ffmpeg";

    /// Locate the default transcoder and fully initialize a handle
    pub async fn initialize() -> Result<Self> {
        let binary = which::which(Self::DEFAULT_BINARY).map_err(|_| {
            VolumeError::EngineUnavailable(format!("{} not found in PATH", Self::DEFAULT_BINARY))
        })?;
        Self::with_binary(binary).await
    }

    /// Initialize a handle around a specific transcoder binary.
    ///
    /// The binary is probed with `-version` before the handle is handed out,
    /// so decode calls never discover a broken installation mid-flight.
    pub async fn with_binary(binary: impl Into<PathBuf>) -> Result<Self> {
        let binary = binary.into();

        let probe = Command::new(&binary)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                VolumeError::EngineUnavailable(format!(
                    "cannot run {}: {}",
                    binary.display(),
                    e
                ))
            })?;
        if !probe.success() {
            return Err(VolumeError::EngineUnavailable(format!(
                "{} failed its version probe ({})",
                binary.display(),
                probe
            )));
        }

        let staging = TempDir::new().map_err(|e| {
            VolumeError::EngineUnavailable(format!("cannot create staging directory: {}", e))
        })?;

        tracing::debug!(binary = %binary.display(), staging = %staging.path().display(), "codec engine initialized");

        Ok(Self {
            binary,
            staging,
            gate: Mutex::new(()),
            last_failure: RwLock::new(None),
        })
    }

    /// Whether a decode on this handle has failed before.
    ///
    /// Engine state after a failure is not guaranteed clean; retries are
    /// recommended on a fresh handle.
    pub fn is_suspect(&self) -> bool {
        self.last_failure.read().is_some()
    }

    /// Description of the most recent decode failure, if any
    pub fn last_failure(&self) -> Option<String> {
        self.last_failure.read().clone()
    }

    /// The engine's staging directory (its addressable input/output space)
    pub fn staging_dir(&self) -> &Path {
        self.staging.path()
    }

    /// Decode one compressed payload to raw pixel bytes.
    ///
    /// Stages the payload under `request.input_name`, invokes a transcode
    /// equivalent to "auto-detect H.265 input, emit raw video as
    /// `request.pixel_format`", and reads the named output back. Staged files
    /// are removed before returning, success or not, and a failure never
    /// poisons the handle for subsequent calls with other channels.
    pub async fn decode(
        &self,
        request: &DecodeRequest,
        payload: &[u8],
        progress: Option<&ProgressFn>,
    ) -> Result<Bytes> {
        let _gate = self.gate.lock().await;

        let input = self.staging.path().join(&request.input_name);
        let output = input.with_extension("raw");

        let result = self
            .decode_locked(&input, &output, request, payload, progress)
            .await;

        let _ = tokio::fs::remove_file(&input).await;
        let _ = tokio::fs::remove_file(&output).await;

        if let Err(err) = &result {
            *self.last_failure.write() = Some(err.to_string());
        }
        result
    }

    async fn decode_locked(
        &self,
        input: &Path,
        output: &Path,
        request: &DecodeRequest,
        payload: &[u8],
        progress: Option<&ProgressFn>,
    ) -> Result<Bytes> {
        tokio::fs::write(input, payload).await.map_err(|e| {
            VolumeError::codec(
                CodecStage::Staging,
                format!("failed to stage {}: {}", request.input_name, e),
            )
        })?;
        tracing::debug!(input = %input.display(), bytes = payload.len(), "staged compressed payload");

        self.run_transcode(input, output, request, progress).await?;

        let decoded = tokio::fs::read(output).await.map_err(|e| {
            VolumeError::codec(
                CodecStage::Readback,
                format!("failed to read {}: {}", output.display(), e),
            )
        })?;
        tracing::debug!(
            "read back {} of raw {}",
            format_bytes(decoded.len()),
            request.pixel_format
        );
        Ok(Bytes::from(decoded))
    }

    async fn run_transcode(
        &self,
        input: &Path,
        output: &Path,
        request: &DecodeRequest,
        progress: Option<&ProgressFn>,
    ) -> Result<()> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["-hide_banner", "-loglevel", "error", "-y", "-progress", "pipe:1"])
            .arg("-i")
            .arg(input)
            .args(["-f", "rawvideo", "-pix_fmt", request.pixel_format.engine_name()])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            VolumeError::codec(
                CodecStage::Transcode,
                format!("failed to spawn {}: {}", self.binary.display(), e),
            )
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            VolumeError::codec(CodecStage::Transcode, "transcoder stdout not captured")
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            VolumeError::codec(CodecStage::Transcode, "transcoder stderr not captured")
        })?;

        // Drain stderr concurrently so a chatty transcoder cannot stall on a
        // full pipe while we follow the progress stream.
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = BufReader::new(stderr).read_to_string(&mut buf).await;
            buf
        });

        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(frame) = line.strip_prefix("frame=") {
                if let Ok(frame) = frame.trim().parse::<u64>() {
                    report_progress(progress, frame, request.expected_frames);
                }
            }
        }

        let status = child.wait().await.map_err(|e| {
            VolumeError::codec(CodecStage::Transcode, format!("wait failed: {}", e))
        })?;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let detail = stderr_text.trim();
            let message = if detail.is_empty() {
                format!("transcoder exited with {}", status)
            } else {
                format!("transcoder exited with {}: {}", status, detail)
            };
            return Err(VolumeError::codec(CodecStage::Transcode, message));
        }
        Ok(())
    }
}

/// Report fractional completion for one progress tick.
///
/// Without a frame-count hint there is no denominator, so the callback is
/// skipped and the raw frame count is logged instead. Advisory only.
fn report_progress(progress: Option<&ProgressFn>, frames: u64, expected: Option<u64>) {
    let fraction = expected
        .filter(|total| *total > 0)
        .map(|total| (frames as f64 / total as f64).min(1.0));

    match (progress, fraction) {
        (Some(callback), Some(fraction)) => callback(fraction),
        (Some(_), None) => {}
        (None, Some(fraction)) => {
            tracing::info!("transcode {:.0}% ({} frames)", fraction * 100.0, frames)
        }
        (None, None) => tracing::debug!(frames, "transcode progress"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_pixel_format_properties() {
        assert_eq!(PixelFormat::Gray.engine_name(), "gray");
        assert_eq!(PixelFormat::Gray.bytes_per_sample(), 1);
        assert_eq!(PixelFormat::Gray12Le.engine_name(), "gray12le");
        assert_eq!(PixelFormat::Gray12Le.bytes_per_sample(), 2);
        assert_eq!(PixelFormat::Gray12Le.to_string(), "gray12le");
    }

    #[test]
    fn test_decode_request_builder() {
        let request =
            DecodeRequest::new("vol-chan.h265", PixelFormat::Gray).with_expected_frames(128);
        assert_eq!(request.input_name, "vol-chan.h265");
        assert_eq!(request.expected_frames, Some(128));
    }

    #[test]
    fn test_report_progress_fraction() {
        let ticks = Arc::new(AtomicU64::new(0));
        let ticks_cb = Arc::clone(&ticks);
        let callback = move |fraction: f64| {
            assert!((0.0..=1.0).contains(&fraction));
            ticks_cb.fetch_add(1, Ordering::SeqCst);
        };

        report_progress(Some(&callback), 64, Some(128));
        report_progress(Some(&callback), 256, Some(128)); // clamped to 1.0
        report_progress(Some(&callback), 64, None); // no denominator, skipped
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let err = CodecEngine::with_binary("/nonexistent/transcoder")
            .await
            .unwrap_err();
        assert!(matches!(err, VolumeError::EngineUnavailable(_)));
    }

    #[tokio::test]
    async fn test_failed_decode_marks_handle_suspect() {
        // `true` passes the version probe but produces no output file, which
        // exercises the readback failure path without a real transcoder.
        let Ok(stub) = which::which("true") else {
            eprintln!("Skipping test: no `true` binary in PATH");
            return;
        };
        let engine = CodecEngine::with_binary(stub).await.unwrap();
        assert!(!engine.is_suspect());

        let request = DecodeRequest::new("vol-chan.h265", PixelFormat::Gray);
        let err = engine.decode(&request, b"payload", None).await.unwrap_err();
        assert!(matches!(
            err,
            VolumeError::Codec {
                stage: CodecStage::Readback,
                ..
            }
        ));

        // The failure is recorded, but the handle still accepts further calls.
        assert!(engine.is_suspect());
        assert!(engine.last_failure().is_some());
        let request = DecodeRequest::new("vol-other.h265", PixelFormat::Gray);
        assert!(engine.decode(&request, b"payload", None).await.is_err());

        // Staged inputs do not outlive their call.
        let mut entries = tokio::fs::read_dir(engine.staging_dir()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }
}
