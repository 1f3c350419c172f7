//! Construction-time configuration of a voxel source

use crate::error::{Result, SourceError};
use crate::types::Resolution;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How to combine datasets whose shapes differ.
///
/// All datasets of a source are assumed to start at index zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginPolicy {
    /// Use the per-axis minimum shape and warn about truncated axes
    #[default]
    Truncate,
    /// Refuse to set up unless every dataset has the same shape
    RequireEqualShapes,
}

/// Dataset keys and overrides for one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Key of the primary (raw) dataset
    pub raw_dataset: String,

    #[serde(default)]
    pub gt_dataset: Option<String>,

    #[serde(default)]
    pub gt_mask_dataset: Option<String>,

    /// Voxel spacing; when set, stored metadata is never consulted
    #[serde(default)]
    pub resolution: Option<Vec<f64>>,

    #[serde(default)]
    pub origin_policy: OriginPolicy,
}

impl SourceConfig {
    pub fn new(raw_dataset: impl Into<String>) -> Self {
        Self {
            raw_dataset: raw_dataset.into(),
            gt_dataset: None,
            gt_mask_dataset: None,
            resolution: None,
            origin_policy: OriginPolicy::default(),
        }
    }

    pub fn with_gt(mut self, key: impl Into<String>) -> Self {
        self.gt_dataset = Some(key.into());
        self
    }

    pub fn with_gt_mask(mut self, key: impl Into<String>) -> Self {
        self.gt_mask_dataset = Some(key.into());
        self
    }

    pub fn with_resolution(mut self, resolution: Vec<f64>) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn with_origin_policy(mut self, policy: OriginPolicy) -> Self {
        self.origin_policy = policy;
        self
    }

    /// Present dataset keys: raw first, then labels, then mask
    pub fn dataset_keys(&self) -> Vec<&str> {
        std::iter::once(self.raw_dataset.as_str())
            .chain(self.gt_dataset.as_deref())
            .chain(self.gt_mask_dataset.as_deref())
            .collect()
    }

    /// Checks that do not need the store
    pub fn validate(&self) -> Result<()> {
        if self.raw_dataset.is_empty() {
            return Err(SourceError::Configuration(
                "raw dataset key is empty".to_string(),
            ));
        }
        if let Some(resolution) = &self.resolution {
            if !Resolution::is_valid_spacing(resolution) {
                return Err(SourceError::Configuration(format!(
                    "resolution must be positive and finite on every axis, got {:?}",
                    resolution
                )));
            }
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: SourceConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dataset_keys_order() {
        let config = SourceConfig::new("raw").with_gt_mask("mask").with_gt("labels");
        assert_eq!(config.dataset_keys(), vec!["raw", "labels", "mask"]);
        assert_eq!(SourceConfig::new("raw").dataset_keys(), vec!["raw"]);
    }

    #[test]
    fn test_from_json_defaults() {
        let config = SourceConfig::from_json(r#"{"raw_dataset": "volumes/raw"}"#).unwrap();
        assert_eq!(config, SourceConfig::new("volumes/raw"));
        assert_eq!(config.origin_policy, OriginPolicy::Truncate);
    }

    #[test]
    fn test_from_json_full() {
        let config = SourceConfig::from_json(
            r#"{
                "raw_dataset": "raw",
                "gt_dataset": "labels",
                "gt_mask_dataset": "mask",
                "resolution": [40, 4, 4],
                "origin_policy": "require_equal_shapes"
            }"#,
        )
        .unwrap();
        assert_eq!(config.resolution, Some(vec![40.0, 4.0, 4.0]));
        assert_eq!(config.origin_policy, OriginPolicy::RequireEqualShapes);
    }

    #[test]
    fn test_invalid_resolution() {
        for bad in [vec![], vec![1.0, 0.0], vec![f64::NAN]] {
            let config = SourceConfig::new("raw").with_resolution(bad);
            assert!(matches!(
                config.validate(),
                Err(SourceError::Configuration(_))
            ));
        }
        assert!(SourceConfig::new("").validate().is_err());
    }

    #[tokio::test]
    async fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("source.json");
        tokio::fs::write(&path, r#"{"raw_dataset": "raw", "gt_dataset": "gt"}"#)
            .await
            .unwrap();
        let config = SourceConfig::from_file(&path).await.unwrap();
        assert_eq!(config.gt_dataset.as_deref(), Some("gt"));
    }
}
