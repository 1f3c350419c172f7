//! Core data types for voxel sources

use serde::{Deserialize, Serialize};
use std::fmt;

/// Element types a stored dataset may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
    /// Unsigned 8-bit integer
    U8 = 1,
    /// Unsigned 16-bit integer
    U16 = 2,
    /// Unsigned 32-bit integer
    U32 = 3,
    /// Unsigned 64-bit integer
    U64 = 4,
    /// Signed 8-bit integer
    I8 = 5,
    /// Signed 16-bit integer
    I16 = 6,
    /// Signed 32-bit integer
    I32 = 7,
    /// Signed 64-bit integer
    I64 = 8,
    /// 32-bit floating point
    F32 = 9,
    /// 64-bit floating point
    F64 = 10,
}

impl DataType {
    /// Size in bytes of this data type
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 => 4,
            DataType::U64 | DataType::I64 | DataType::F64 => 8,
        }
    }

    /// Check if this is a floating point type
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Kinds of data a source can put into a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// Primary image data, read over the input ROI
    Raw,
    /// Ground-truth labels, read over the output ROI
    GtLabels,
    /// Ground-truth mask, read over the output ROI
    GtMask,
}

impl DataKind {
    pub const ALL: [DataKind; 3] = [DataKind::Raw, DataKind::GtLabels, DataKind::GtMask];

    /// Stable key used in logs and serialized batches
    pub fn key(&self) -> &'static str {
        match self {
            DataKind::Raw => "raw",
            DataKind::GtLabels => "gt_labels",
            DataKind::GtMask => "gt_mask",
        }
    }

    /// Whether values of this kind may be interpolated by downstream
    /// augmentations. Labels and masks are categorical.
    pub fn interpolatable(&self) -> bool {
        match self {
            DataKind::Raw => true,
            DataKind::GtLabels | DataKind::GtMask => false,
        }
    }

    fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Set of data kinds a source is able to provide
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn with(mut self, kind: DataKind) -> Self {
        self.insert(kind);
        self
    }

    pub fn insert(&mut self, kind: DataKind) {
        self.0 |= kind.bit();
    }

    pub fn contains(&self, kind: DataKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = DataKind> + '_ {
        DataKind::ALL.into_iter().filter(|k| self.contains(*k))
    }

    /// First requested kind this set cannot serve, in `DataKind` order
    pub fn first_missing<'a>(
        &self,
        requested: impl IntoIterator<Item = &'a DataKind>,
    ) -> Option<DataKind> {
        requested.into_iter().copied().find(|k| !self.contains(*k))
    }
}

impl FromIterator<DataKind> for Capabilities {
    fn from_iter<I: IntoIterator<Item = DataKind>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Capabilities::empty(), |caps, kind| caps.with(kind))
    }
}

/// Where an effective resolution came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionOrigin {
    /// Supplied in the source configuration
    Configured,
    /// Read from the primary dataset's `resolution` attribute
    Stored,
    /// Neither was available; all axes assumed to be 1
    Default,
}

/// Physical voxel spacing per axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub values: Vec<f64>,
    pub origin: ResolutionOrigin,
}

impl Resolution {
    pub fn new(values: Vec<f64>, origin: ResolutionOrigin) -> Self {
        Self { values, origin }
    }

    /// Unit spacing on every axis
    pub fn unit(dims: usize) -> Self {
        Self::new(vec![1.0; dims], ResolutionOrigin::Default)
    }

    /// True when the value is a fallback rather than a known spacing
    pub fn is_default(&self) -> bool {
        self.origin == ResolutionOrigin::Default
    }

    pub fn dims(&self) -> usize {
        self.values.len()
    }

    /// Whether `values` can serve as voxel spacing: at least one axis,
    /// every value positive and finite
    pub fn is_valid_spacing(values: &[f64]) -> bool {
        !values.is_empty() && values.iter().all(|v| v.is_finite() && *v > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_spacing() {
        assert!(Resolution::is_valid_spacing(&[40.0, 4.0, 4.0]));
        assert!(!Resolution::is_valid_spacing(&[]));
        assert!(!Resolution::is_valid_spacing(&[0.0, -4.0, f64::NAN]));
        assert!(!Resolution::is_valid_spacing(&[4.0, f64::INFINITY]));
    }

    #[test]
    fn test_data_type_sizes() {
        assert_eq!(DataType::U8.size_in_bytes(), 1);
        assert_eq!(DataType::U16.size_in_bytes(), 2);
        assert_eq!(DataType::F32.size_in_bytes(), 4);
        assert_eq!(DataType::U64.size_in_bytes(), 8);
        assert!(DataType::F64.is_float());
        assert!(!DataType::I32.is_float());
    }

    #[test]
    fn test_data_kind_keys() {
        assert_eq!(DataKind::Raw.to_string(), "raw");
        assert_eq!(DataKind::GtMask.key(), "gt_mask");
        assert!(DataKind::Raw.interpolatable());
        assert!(!DataKind::GtLabels.interpolatable());
        assert_eq!(
            serde_json::to_string(&DataKind::GtLabels).unwrap(),
            "\"gt_labels\""
        );
    }

    #[test]
    fn test_capabilities() {
        let caps: Capabilities = [DataKind::Raw, DataKind::GtMask].into_iter().collect();
        assert!(caps.contains(DataKind::Raw));
        assert!(!caps.contains(DataKind::GtLabels));
        assert_eq!(
            caps.iter().collect::<Vec<_>>(),
            vec![DataKind::Raw, DataKind::GtMask]
        );
        assert_eq!(
            caps.first_missing(&[DataKind::Raw, DataKind::GtLabels]),
            Some(DataKind::GtLabels)
        );
        assert_eq!(caps.first_missing(&[DataKind::GtMask]), None);
    }

    #[test]
    fn test_unit_resolution() {
        let res = Resolution::unit(3);
        assert_eq!(res.values, vec![1.0, 1.0, 1.0]);
        assert!(res.is_default());
    }
}
