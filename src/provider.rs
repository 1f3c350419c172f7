//! Batch providers - the main API for serving sub-volumes of a source

use crate::batch::{Batch, BatchRequest, Volume};
use crate::config::SourceConfig;
use crate::error::{Result, SourceError};
use crate::extent::resolve_extents;
use crate::metadata::{attribute_as_f64s, RESOLUTION_ATTRIBUTE};
use crate::profiling::Timing;
use crate::roi::Roi;
use crate::store::{ArrayStore, StoreHandle};
use crate::types::{Capabilities, DataKind, Resolution, ResolutionOrigin};
use async_trait::async_trait;
use std::fmt;
use tracing::{debug, warn};

/// What a source can serve, computed once by `setup`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSpec {
    /// Extent shared by all datasets of the source
    pub roi: Roi,
    /// Bounding box of the positive ground-truth mask, if a mask is configured
    pub gt_roi: Option<Roi>,
    pub capabilities: Capabilities,
}

impl ProviderSpec {
    pub fn has_gt(&self) -> bool {
        self.capabilities.contains(DataKind::GtLabels)
    }

    pub fn has_gt_mask(&self) -> bool {
        self.capabilities.contains(DataKind::GtMask)
    }
}

/// A node that serves batches to a pipeline
#[async_trait]
pub trait BatchProvider: Send + Sync {
    /// Compute and cache the provider spec. Must run before any request.
    async fn setup(&mut self) -> Result<()>;

    /// The cached spec
    fn spec(&self) -> Result<&ProviderSpec>;

    /// Read the requested kinds over the requested regions
    async fn request_batch(&self, request: &BatchRequest) -> Result<Batch>;
}

/// Provider backed by raw, label and mask datasets of one [`ArrayStore`]
pub struct ArraySource<S: ArrayStore> {
    store: S,
    config: SourceConfig,
    spec: Option<ProviderSpec>,
}

impl<S: ArrayStore> ArraySource<S> {
    pub fn new(store: S, config: SourceConfig) -> Self {
        Self {
            store,
            config,
            spec: None,
        }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn dataset_key(&self, kind: DataKind) -> Result<&str> {
        let key = match kind {
            DataKind::Raw => Some(self.config.raw_dataset.as_str()),
            DataKind::GtLabels => self.config.gt_dataset.as_deref(),
            DataKind::GtMask => self.config.gt_mask_dataset.as_deref(),
        };
        key.ok_or(SourceError::Capability { kind })
    }

    fn capabilities(&self) -> Capabilities {
        DataKind::ALL
            .into_iter()
            .filter(|&kind| self.dataset_key(kind).is_ok())
            .collect()
    }

    /// Effective resolution: configured, else stored on the raw dataset,
    /// else unit spacing with a warning
    async fn resolve_resolution(
        &self,
        handle: &dyn StoreHandle,
        dims: usize,
    ) -> Result<Resolution> {
        if let Some(values) = &self.config.resolution {
            return Ok(Resolution::new(values.clone(), ResolutionOrigin::Configured));
        }

        let key = &self.config.raw_dataset;
        match handle.attribute(key, RESOLUTION_ATTRIBUTE).await? {
            Some(value) => {
                let values = attribute_as_f64s(&value).ok_or_else(|| {
                    SourceError::Metadata(format!(
                        "'{}' attribute of {} is not numeric: {}",
                        RESOLUTION_ATTRIBUTE, key, value
                    ))
                })?;
                check_resolution_dims(&values, dims, key)?;
                if !Resolution::is_valid_spacing(&values) {
                    return Err(SourceError::Metadata(format!(
                        "'{}' attribute of {} must be positive and finite, got {:?}",
                        RESOLUTION_ATTRIBUTE, key, values
                    )));
                }
                Ok(Resolution::new(values, ResolutionOrigin::Stored))
            }
            None => {
                let resolution = Resolution::unit(dims);
                warn!(
                    source = %self,
                    dataset = %key,
                    assumed = ?resolution.values,
                    "no resolution attribute on raw dataset, assuming unit spacing"
                );
                Ok(resolution)
            }
        }
    }
}

fn check_resolution_dims(values: &[f64], dims: usize, what: &str) -> Result<()> {
    if values.len() != dims {
        return Err(SourceError::Configuration(format!(
            "resolution of {} has {} axes, data has {}",
            what,
            values.len(),
            dims
        )));
    }
    Ok(())
}

impl<S: ArrayStore> fmt::Display for ArraySource<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.store.identifier())
    }
}

#[async_trait]
impl<S: ArrayStore> BatchProvider for ArraySource<S> {
    async fn setup(&mut self) -> Result<()> {
        self.config.validate()?;

        let extents = {
            let handle = self.store.open().await?;
            resolve_extents(handle.as_ref(), &self.config, self.store.identifier()).await?
        };

        if let Some(resolution) = &self.config.resolution {
            check_resolution_dims(resolution, extents.roi.dims(), "configuration")?;
        }

        let spec = ProviderSpec {
            roi: extents.roi,
            gt_roi: extents.gt_roi,
            capabilities: self.capabilities(),
        };
        debug!(source = %self, roi = %spec.roi, "source set up");
        self.spec = Some(spec);
        Ok(())
    }

    fn spec(&self) -> Result<&ProviderSpec> {
        self.spec.as_ref().ok_or(SourceError::NotInitialized)
    }

    async fn request_batch(&self, request: &BatchRequest) -> Result<Batch> {
        let mut timing = Timing::started(self.store.identifier());
        let spec = self.spec()?;

        if let Some(kind) = spec.capabilities.first_missing(&request.kinds) {
            return Err(SourceError::Capability { kind });
        }

        for (label, roi) in [("Input", &request.input_roi), ("Output", &request.output_roi)] {
            if !spec.roi.contains(roi) {
                return Err(SourceError::OutOfBounds {
                    label,
                    requested: roi.clone(),
                    available: spec.roi.clone(),
                });
            }
        }

        debug!(
            source = %self,
            input = %request.input_roi,
            output = %request.output_roi,
            "filling batch request"
        );

        let handle = self.store.open().await?;
        let resolution = self
            .resolve_resolution(handle.as_ref(), spec.roi.dims())
            .await?;
        let mut batch = Batch::new(resolution);
        debug!(resolution = ?batch.resolution.values, "providing batch");

        for &kind in &request.kinds {
            let key = self.dataset_key(kind)?;
            let roi = request.roi_for(kind);
            debug!(%kind, key, %roi, "reading");
            let data = match handle.read_region(key, &roi.bounding_box()).await {
                Ok(data) => data,
                Err(e) => {
                    warn!(
                        source = %self,
                        %kind,
                        resolution = ?batch.resolution.values,
                        error = %e,
                        "read failed, dropping batch"
                    );
                    return Err(e);
                }
            };
            batch.insert(kind, Volume::new(data, roi.clone(), kind.interpolatable()));
        }
        drop(handle);

        timing.stop();
        batch.profiling.add(timing);
        Ok(batch)
    }
}
