//! Utility functions

use crate::error::{Result, SourceError};
use ndarray::{ArrayD, ArrayViewD, Slice};

/// Check per-axis `[lo, hi)` bounds against a dataset shape and convert
/// them to unsigned ranges
pub fn check_region(shape: &[usize], bounds: &[(i64, i64)]) -> Result<Vec<(usize, usize)>> {
    if bounds.len() != shape.len() {
        return Err(SourceError::DimensionMismatch {
            expected: shape.len(),
            found: bounds.len(),
        });
    }
    bounds
        .iter()
        .zip(shape)
        .enumerate()
        .map(|(axis, (&(lo, hi), &len))| {
            match (usize::try_from(lo), usize::try_from(hi)) {
                (Ok(lo), Ok(hi)) if lo <= hi && hi <= len => Ok((lo, hi)),
                _ => Err(SourceError::StorageRead(format!(
                    "region {}..{} on axis {} outside dataset extent {}",
                    lo, hi, axis, len
                ))),
            }
        })
        .collect()
}

/// Copy the `[lo, hi)` region of every axis out of `array`
pub fn slice_region<T: Clone>(array: ArrayViewD<'_, T>, bounds: &[(i64, i64)]) -> Result<ArrayD<T>> {
    let region = check_region(array.shape(), bounds)?;
    Ok(array
        .slice_each_axis(|ax| {
            let (lo, hi) = region[ax.axis.index()];
            Slice::from(lo..hi)
        })
        .to_owned())
}

/// Format byte size in human-readable form
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

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
