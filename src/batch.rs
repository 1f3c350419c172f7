//! Batch requests and the batches that answer them

use crate::array::VolumeData;
use crate::profiling::ProfilingStats;
use crate::roi::Roi;
use crate::types::{DataKind, Resolution};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// What a caller wants from a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Region read for raw data
    pub input_roi: Roi,
    /// Region read for labels and masks
    pub output_roi: Roi,
    pub kinds: BTreeSet<DataKind>,
}

impl BatchRequest {
    /// A request for raw data only
    pub fn new(input_roi: Roi, output_roi: Roi) -> Self {
        Self {
            input_roi,
            output_roi,
            kinds: BTreeSet::from([DataKind::Raw]),
        }
    }

    pub fn with(mut self, kind: DataKind) -> Self {
        self.kinds.insert(kind);
        self
    }

    pub fn without(mut self, kind: DataKind) -> Self {
        self.kinds.remove(&kind);
        self
    }

    pub fn wants(&self, kind: DataKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Region a given kind is read over
    pub fn roi_for(&self, kind: DataKind) -> &Roi {
        match kind {
            DataKind::Raw => &self.input_roi,
            DataKind::GtLabels | DataKind::GtMask => &self.output_roi,
        }
    }
}

/// One array of a batch together with the region it covers
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    /// Values in the element type of the stored dataset
    pub data: VolumeData,
    pub roi: Roi,
    /// Whether downstream augmentations may interpolate the values
    pub interpolate: bool,
}

impl Volume {
    pub fn new(data: VolumeData, roi: Roi, interpolate: bool) -> Self {
        Self {
            data,
            roi,
            interpolate,
        }
    }
}

/// Arrays read for one request, plus resolution and timings
#[derive(Debug, Clone)]
pub struct Batch {
    pub volumes: BTreeMap<DataKind, Volume>,
    pub resolution: Resolution,
    pub profiling: ProfilingStats,
}

impl Batch {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            volumes: BTreeMap::new(),
            resolution,
            profiling: ProfilingStats::new(),
        }
    }

    pub fn get(&self, kind: DataKind) -> Option<&Volume> {
        self.volumes.get(&kind)
    }

    pub fn insert(&mut self, kind: DataKind, volume: Volume) {
        self.volumes.insert(kind, volume);
    }

    pub fn kinds(&self) -> impl Iterator<Item = DataKind> + '_ {
        self.volumes.keys().copied()
    }
}
