//! Utility functions

use crate::error::{Result, VolumeError};
use num_traits::PrimInt;
use std::collections::HashMap;
use std::hash::Hash;

/// Reinterpret raw bytes as little-endian 16-bit samples
///
/// No value scaling happens here; a 12-bit payload keeps its dynamic range.
pub fn bytes_to_u16_le(bytes: &[u8]) -> Result<Vec<u16>> {
    if bytes.len() % 2 != 0 {
        return Err(VolumeError::InvalidOutput(format!(
            "byte length {} not aligned to 16-bit samples",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Most frequent sample value in a slice
///
/// Ties resolve to the smaller value so the result is deterministic.
pub fn slice_mode<T: PrimInt + Hash>(samples: &[T]) -> Option<T> {
    let mut counts: HashMap<T, usize> = HashMap::new();
    for &sample in samples {
        *counts.entry(sample).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .max_by(|(va, ca), (vb, cb)| ca.cmp(cb).then(vb.cmp(va)))
        .map(|(value, _)| value)
}

/// Format byte size in human-readable form
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_u16_le() {
        let bytes = [0x01, 0x00, 0xFF, 0x0F, 0x00, 0x10];
        let samples = bytes_to_u16_le(&bytes).unwrap();
        assert_eq!(samples, vec![1, 4095, 4096]);
    }

    #[test]
    fn test_bytes_to_u16_le_odd_length() {
        let err = bytes_to_u16_le(&[0x01, 0x00, 0xFF]).unwrap_err();
        assert!(matches!(err, VolumeError::InvalidOutput(_)));
    }

    #[test]
    fn test_bytes_to_u16_le_empty() {
        assert_eq!(bytes_to_u16_le(&[]).unwrap(), Vec::<u16>::new());
    }

    #[test]
    fn test_slice_mode() {
        assert_eq!(slice_mode::<u8>(&[]), None);
        assert_eq!(slice_mode(&[7u8]), Some(7));
        assert_eq!(slice_mode(&[3u16, 5, 3, 5, 3]), Some(3));
        // Tie resolves to the smaller value
        assert_eq!(slice_mode(&[4u8, 2, 4, 2]), Some(2));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }
}
