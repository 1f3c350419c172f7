//! On-disk dataset headers

use crate::compression::CompressionMethod;
use crate::error::{Result, SourceError};
use crate::layout::{default_chunk_shape, ChunkGrid};
use crate::types::DataType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Name of the attribute holding per-axis voxel spacing
pub const RESOLUTION_ATTRIBUTE: &str = "resolution";

/// Dataset header format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatVersion {
    pub major: u16,
    pub minor: u16,
}

impl FormatVersion {
    pub const CURRENT: Self = Self { major: 1, minor: 0 };

    pub fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    pub fn is_compatible(&self, other: &Self) -> bool {
        self.major == other.major
    }
}

impl Default for FormatVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Header stored next to every dataset payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetHeader {
    #[serde(default)]
    pub version: FormatVersion,

    /// Number of elements along each axis, slowest-varying first
    pub shape: Vec<usize>,

    pub data_type: DataType,

    /// Shape of the independently compressed chunks
    pub chunk_shape: Vec<usize>,

    #[serde(default)]
    pub compression: CompressionMethod,

    /// Free-form scalar or vector attributes, e.g. `resolution`
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,

    pub created_at: DateTime<Utc>,
}

impl DatasetHeader {
    pub fn new(shape: Vec<usize>, data_type: DataType) -> Self {
        Self {
            version: FormatVersion::default(),
            chunk_shape: default_chunk_shape(&shape),
            shape,
            data_type,
            compression: CompressionMethod::default(),
            attributes: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_compression(mut self, method: CompressionMethod) -> Self {
        self.compression = method;
        self
    }

    pub fn with_chunk_shape(mut self, chunk_shape: Vec<usize>) -> Self {
        self.chunk_shape = chunk_shape;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn with_resolution(self, resolution: &[f64]) -> Self {
        self.with_attribute(RESOLUTION_ATTRIBUTE, Value::from(resolution.to_vec()))
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Size of the whole decoded dataset in bytes
    pub fn payload_bytes(&self) -> usize {
        self.num_elements() * self.data_type.size_in_bytes()
    }

    pub fn chunk_grid(&self) -> Result<ChunkGrid> {
        ChunkGrid::new(self.shape.clone(), self.chunk_shape.clone())
    }

    /// Parse and check a header read from storage
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let header: DatasetHeader = serde_json::from_slice(bytes)?;
        if !header.version.is_compatible(&FormatVersion::CURRENT) {
            return Err(SourceError::Metadata(format!(
                "unsupported header version {}.{}",
                header.version.major, header.version.minor
            )));
        }
        Ok(header)
    }
}

/// Interpret an attribute value as a vector of numbers.
///
/// Scalars are accepted as one-element vectors.
pub fn attribute_as_f64s(value: &Value) -> Option<Vec<f64>> {
    match value {
        Value::Number(n) => n.as_f64().map(|v| vec![v]),
        Value::Array(items) => items.iter().map(Value::as_f64).collect(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_version_compatibility() {
        assert!(FormatVersion::new(1, 0).is_compatible(&FormatVersion::new(1, 3)));
        assert!(!FormatVersion::new(1, 0).is_compatible(&FormatVersion::new(2, 0)));
    }

    #[test]
    fn test_header_json() {
        let header = DatasetHeader::new(vec![4, 5, 6], DataType::U16)
            .with_compression(CompressionMethod::Deflate)
            .with_resolution(&[40.0, 4.0, 4.0]);
        assert_eq!(header.payload_bytes(), 4 * 5 * 6 * 2);

        let bytes = serde_json::to_vec(&header).unwrap();
        let parsed = DatasetHeader::from_json(&bytes).unwrap();
        assert_eq!(parsed.shape, vec![4, 5, 6]);
        assert_eq!(parsed.chunk_shape, vec![4, 5, 6]);
        assert_eq!(parsed.compression, CompressionMethod::Deflate);
        assert_eq!(
            parsed.attribute(RESOLUTION_ATTRIBUTE),
            Some(&json!([40.0, 4.0, 4.0]))
        );
    }

    #[test]
    fn test_chunk_grid() {
        let header = DatasetHeader::new(vec![130, 8], DataType::U32).with_chunk_shape(vec![32, 8]);
        let grid = header.chunk_grid().unwrap();
        assert_eq!(grid.grid_shape(), vec![5, 1]);

        let header = header.with_chunk_shape(vec![0, 8]);
        assert!(matches!(header.chunk_grid(), Err(SourceError::Metadata(_))));

        let missing = r#"{"shape": [2], "data_type": "U8", "created_at": "2024-01-01T00:00:00Z"}"#;
        assert!(DatasetHeader::from_json(missing.as_bytes()).is_err());
    }

    #[test]
    fn test_incompatible_version_rejected() {
        let mut header = DatasetHeader::new(vec![1], DataType::U8);
        header.version = FormatVersion::new(9, 0);
        let bytes = serde_json::to_vec(&header).unwrap();
        assert!(matches!(
            DatasetHeader::from_json(&bytes),
            Err(SourceError::Metadata(_))
        ));
    }

    #[test]
    fn test_attribute_as_f64s() {
        assert_eq!(attribute_as_f64s(&json!([1, 2.5])), Some(vec![1.0, 2.5]));
        assert_eq!(attribute_as_f64s(&json!(3)), Some(vec![3.0]));
        assert_eq!(attribute_as_f64s(&json!(["a"])), None);
        assert_eq!(attribute_as_f64s(&json!({"x": 1})), None);
    }
}
