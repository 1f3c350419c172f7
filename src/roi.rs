//! N-dimensional regions of interest
//!
//! A [`Roi`] is the half-open box `[offset_i, offset_i + shape_i)` on every
//! axis. Its dimensionality is fixed at construction, and every end
//! coordinate `offset_i + shape_i` fits in an `i64`.

use crate::error::{Result, SourceError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned half-open box described by an offset and a shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RoiRepr")]
pub struct Roi {
    offset: Vec<i64>,
    shape: Vec<usize>,
}

#[derive(Deserialize)]
struct RoiRepr {
    offset: Vec<i64>,
    shape: Vec<usize>,
}

impl TryFrom<RoiRepr> for Roi {
    type Error = SourceError;

    fn try_from(repr: RoiRepr) -> Result<Self> {
        Roi::new(repr.offset, repr.shape)
    }
}

/// `offset + len` if it is representable
fn axis_end(axis: usize, offset: i64, len: usize) -> Result<i64> {
    i64::try_from(len)
        .ok()
        .and_then(|len| offset.checked_add(len))
        .ok_or_else(|| {
            SourceError::InvalidBounds(format!(
                "axis {} of length {} at offset {} ends past {}",
                axis,
                len,
                offset,
                i64::MAX
            ))
        })
}

impl Roi {
    /// Create a ROI from an offset and a shape of the same length
    pub fn new(offset: Vec<i64>, shape: Vec<usize>) -> Result<Self> {
        if offset.len() != shape.len() {
            return Err(SourceError::DimensionMismatch {
                expected: offset.len(),
                found: shape.len(),
            });
        }
        for (axis, (&o, &s)) in offset.iter().zip(&shape).enumerate() {
            axis_end(axis, o, s)?;
        }
        Ok(Self { offset, shape })
    }

    /// Create a ROI anchored at the origin
    pub fn from_shape(shape: Vec<usize>) -> Result<Self> {
        Self::new(vec![0; shape.len()], shape)
    }

    /// Create a ROI from per-axis `[lo, hi)` pairs
    pub fn from_bounding_box(bounds: &[(i64, i64)]) -> Result<Self> {
        let mut offset = Vec::with_capacity(bounds.len());
        let mut shape = Vec::with_capacity(bounds.len());
        for (axis, &(lo, hi)) in bounds.iter().enumerate() {
            if hi < lo {
                return Err(SourceError::InvalidBounds(format!(
                    "axis {} ends at {} before it starts at {}",
                    axis, hi, lo
                )));
            }
            let len = usize::try_from(hi.abs_diff(lo)).map_err(|_| {
                SourceError::InvalidBounds(format!("axis {} spans {}..{}", axis, lo, hi))
            })?;
            offset.push(lo);
            shape.push(len);
        }
        Self::new(offset, shape)
    }

    pub fn offset(&self) -> &[i64] {
        &self.offset
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of axes
    pub fn dims(&self) -> usize {
        self.offset.len()
    }

    /// Exclusive end coordinate on every axis
    pub fn end(&self) -> Vec<i64> {
        self.offset
            .iter()
            .zip(&self.shape)
            .map(|(&o, &s)| o + s as i64) // cannot overflow, checked on construction
            .collect()
    }

    /// Number of voxels covered
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    /// True if any axis has zero extent
    pub fn is_empty(&self) -> bool {
        self.shape.iter().any(|&s| s == 0)
    }

    /// Check whether `other` lies completely inside this ROI.
    ///
    /// ROIs of different dimensionality never contain each other.
    pub fn contains(&self, other: &Roi) -> bool {
        if self.dims() != other.dims() {
            return false;
        }
        let end = self.end();
        let other_end = other.end();
        (0..self.dims()).all(|i| other.offset[i] >= self.offset[i] && other_end[i] <= end[i])
    }

    /// Per-axis `[lo, hi)` pairs in axis order, suitable for a bounded read
    pub fn bounding_box(&self) -> Vec<(i64, i64)> {
        self.offset.iter().copied().zip(self.end()).collect()
    }

    /// Usable extent of two co-registered datasets.
    ///
    /// Both are assumed to start at index zero, so only the shapes are
    /// reduced and the result is anchored at the origin.
    pub fn intersect_from_origin(&self, other: &Roi) -> Result<Roi> {
        if self.dims() != other.dims() {
            return Err(SourceError::DimensionMismatch {
                expected: self.dims(),
                found: other.dims(),
            });
        }
        let shape = self
            .shape
            .iter()
            .zip(&other.shape)
            .map(|(&a, &b)| a.min(b))
            .collect();
        Roi::from_shape(shape)
    }

    /// General box intersection. `None` if the boxes do not overlap.
    pub fn intersect(&self, other: &Roi) -> Option<Roi> {
        if self.dims() != other.dims() {
            return None;
        }
        let end = self.end();
        let other_end = other.end();
        let mut offset = Vec::with_capacity(self.dims());
        let mut shape = Vec::with_capacity(self.dims());
        for i in 0..self.dims() {
            let lo = self.offset[i].max(other.offset[i]);
            let hi = end[i].min(other_end[i]);
            if hi <= lo {
                return None;
            }
            offset.push(lo);
            shape.push((hi - lo) as usize);
        }
        Some(Roi { offset, shape })
    }

    /// Enlarge by `negative` voxels before and `positive` voxels after each axis
    pub fn grow(&self, negative: &[usize], positive: &[usize]) -> Result<Roi> {
        self.check_axes(negative.len())?;
        self.check_axes(positive.len())?;
        let mut bounds = Vec::with_capacity(self.dims());
        for (axis, (lo, hi)) in self.bounding_box().into_iter().enumerate() {
            let lo = i64::try_from(negative[axis])
                .ok()
                .and_then(|n| lo.checked_sub(n));
            let hi = i64::try_from(positive[axis])
                .ok()
                .and_then(|p| hi.checked_add(p));
            match (lo, hi) {
                (Some(lo), Some(hi)) => bounds.push((lo, hi)),
                _ => {
                    return Err(SourceError::InvalidBounds(format!(
                        "growing {} by {:?}/{:?} leaves the i64 range",
                        self, negative, positive
                    )))
                }
            }
        }
        Roi::from_bounding_box(&bounds)
    }

    /// Move the ROI by `delta` without changing its shape
    pub fn shift(&self, delta: &[i64]) -> Result<Roi> {
        self.check_axes(delta.len())?;
        let offset = self
            .offset
            .iter()
            .zip(delta)
            .map(|(&o, &d)| o.checked_add(d))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                SourceError::InvalidBounds(format!("shifting {} by {:?} overflows", self, delta))
            })?;
        Roi::new(offset, self.shape.clone())
    }

    fn check_axes(&self, found: usize) -> Result<()> {
        if found != self.dims() {
            return Err(SourceError::DimensionMismatch {
                expected: self.dims(),
                found,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (lo, hi)) in self.bounding_box().into_iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", lo, hi)?;
        }
        write!(f, "]")
    }
}
