//! Voxel Source - region-of-interest batches from volumetric datasets
//!
//! Serves rectangular sub-volumes of large image stacks and their
//! ground-truth label and mask volumes to a training pipeline.
//!
//! # Features
//!
//! - Dimension-generic [`Roi`] geometry with containment checks
//! - Overall extent resolved across raw, label and mask datasets
//! - Ground-truth ROI derived from the positive elements of a sparse mask
//! - Arrays keep the element type they were stored with ([`VolumeData`])
//! - Scoped store sessions released on every exit path
//! - In-memory and chunked local filesystem stores (implement [`ArrayStore`]
//!   for others)
//!
//! # Example
//!
//! ```rust,ignore
//! use voxel_source::{ArraySource, BatchProvider, BatchRequest, DataKind};
//! use voxel_source::{FileSystemStore, Roi, SourceConfig};
//!
//! # async fn example() -> voxel_source::Result<()> {
//! let config = SourceConfig::new("volumes/raw")
//!     .with_gt("volumes/labels")
//!     .with_gt_mask("volumes/mask");
//! let mut source = ArraySource::new(FileSystemStore::new("/data/sample_A"), config);
//! source.setup().await?;
//!
//! let input = Roi::new(vec![0, 0, 0], vec![84, 268, 268])?;
//! let output = Roi::new(vec![14, 46, 46], vec![56, 176, 176])?;
//! let request = BatchRequest::new(input, output).with(DataKind::GtLabels);
//! let batch = source.request_batch(&request).await?;
//! # Ok(())
//! # }
//! ```

pub mod array;
pub mod batch;
pub mod compression;
pub mod config;
pub mod error;
pub mod extent;
pub mod layout;
pub mod metadata;
pub mod profiling;
pub mod provider;
pub mod roi;
pub mod store;
pub mod types;
pub mod utils;

// Re-exports
pub use array::{Element, VolumeData};
pub use batch::{Batch, BatchRequest, Volume};
pub use compression::CompressionMethod;
pub use config::{OriginPolicy, SourceConfig};
pub use error::{Result, SourceError};
pub use extent::{ground_truth_roi, MaskBounds};
pub use layout::ChunkGrid;
pub use metadata::DatasetHeader;
pub use profiling::{ProfilingStats, Timing};
pub use provider::{ArraySource, BatchProvider, ProviderSpec};
pub use roi::Roi;
pub use store::{ArrayStore, FileSystemStore, MemoryStore, StoreHandle};
pub use types::{Capabilities, DataKind, DataType, Resolution, ResolutionOrigin};

/// Version of this crate
pub const VOXEL_SOURCE_VERSION: &str = env!("CARGO_PKG_VERSION");
