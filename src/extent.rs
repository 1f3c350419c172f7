//! Extent resolution: the overall ROI of a source and the ground-truth ROI
//! of its mask

use crate::array::{with_array, Element, VolumeData};
use crate::config::{OriginPolicy, SourceConfig};
use crate::error::{Result, SourceError};
use crate::roi::Roi;
use crate::store::StoreHandle;
use ndarray::{ArrayViewD, Dimension};
use tracing::{info, warn};

/// Extents computed once per source during setup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extents {
    pub roi: Roi,
    pub gt_roi: Option<Roi>,
}

/// Resolve the extents of all datasets named in `config`
pub async fn resolve_extents(
    handle: &dyn StoreHandle,
    config: &SourceConfig,
    identifier: &str,
) -> Result<Extents> {
    let roi = resolve_roi(
        handle,
        &config.dataset_keys(),
        config.origin_policy,
        identifier,
    )
    .await?;

    let gt_roi = match &config.gt_mask_dataset {
        Some(key) => {
            let mask = handle.read_full(key).await?;
            let gt_roi = ground_truth_roi(key, &mask)?;
            info!(source = identifier, %gt_roi, "ground-truth ROI");
            Some(gt_roi)
        }
        None => None,
    };

    Ok(Extents { roi, gt_roi })
}

/// Overall ROI: per-axis minimum of all dataset shapes, anchored at zero
pub async fn resolve_roi(
    handle: &dyn StoreHandle,
    keys: &[&str],
    policy: OriginPolicy,
    identifier: &str,
) -> Result<Roi> {
    let mut combined: Option<Roi> = None;

    for &key in keys {
        if !handle.has(key).await? {
            return Err(SourceError::Configuration(format!(
                "{} not in {}",
                key, identifier
            )));
        }
        let roi = Roi::from_shape(handle.shape(key).await?)?;

        combined = Some(match combined {
            None => roi,
            Some(current) => {
                if current.dims() != roi.dims() {
                    return Err(SourceError::Configuration(format!(
                        "{} has {} dimensions, expected {}",
                        key,
                        roi.dims(),
                        current.dims()
                    )));
                }
                if current.shape() != roi.shape() {
                    if policy == OriginPolicy::RequireEqualShapes {
                        return Err(SourceError::Configuration(format!(
                            "{} has shape {:?}, expected {:?}",
                            key,
                            roi.shape(),
                            current.shape()
                        )));
                    }
                    warn!(
                        source = identifier,
                        key,
                        shape = ?roi.shape(),
                        combined = ?current.shape(),
                        "dataset shapes differ, truncating to the common extent"
                    );
                }
                current.intersect_from_origin(&roi)?
            }
        });
    }

    combined.ok_or_else(|| SourceError::Configuration("no datasets configured".to_string()))
}

/// Running per-axis bounds of positive mask elements.
///
/// Feed indices one at a time, so a mask can be folded block by block
/// without materializing it.
#[derive(Debug, Clone)]
pub struct MaskBounds {
    min: Vec<usize>,
    max: Vec<usize>,
    count: usize,
}

impl MaskBounds {
    pub fn new(dims: usize) -> Self {
        Self {
            min: vec![usize::MAX; dims],
            max: vec![0; dims],
            count: 0,
        }
    }

    /// Record one positive element at `index`
    pub fn observe(&mut self, index: &[usize]) {
        debug_assert_eq!(index.len(), self.min.len());
        for (axis, &i) in index.iter().enumerate() {
            self.min[axis] = self.min[axis].min(i);
            self.max[axis] = self.max[axis].max(i);
        }
        self.count += 1;
    }

    /// Fold every element greater than zero of a (sub-)array whose first
    /// element sits at `origin` in the full mask
    pub fn observe_block<T: Element>(&mut self, block: ArrayViewD<'_, T>, origin: &[usize]) {
        let mut index = vec![0; origin.len()];
        for (ix, &value) in block.indexed_iter() {
            if value > T::zero() {
                for (axis, (&local, &base)) in ix.slice().iter().zip(origin).enumerate() {
                    index[axis] = base + local;
                }
                self.observe(&index);
            }
        }
    }

    /// Number of positive elements seen
    pub fn count(&self) -> usize {
        self.count
    }

    /// Minimal half-open box around everything observed, `None` if empty
    pub fn finish(&self) -> Option<Roi> {
        if self.count == 0 {
            return None;
        }
        let bounds: Vec<(i64, i64)> = self
            .min
            .iter()
            .zip(&self.max)
            .map(|(&lo, &hi)| (lo as i64, hi as i64 + 1))
            .collect();
        Roi::from_bounding_box(&bounds).ok()
    }
}

/// Minimal bounding box of all elements of `mask` greater than zero
pub fn ground_truth_roi(key: &str, mask: &VolumeData) -> Result<Roi> {
    let origin = vec![0; mask.ndim()];
    let mut bounds = MaskBounds::new(origin.len());
    with_array!(mask, a => bounds.observe_block(a.view(), &origin));
    bounds.finish().ok_or_else(|| SourceError::EmptyMask {
        key: key.to_string(),
    })
}
