//! End-to-end tests of array sources over the local filesystem store
//!
//! Each test writes a small sample (raw, labels, sparse mask) into a
//! temporary directory and serves batches from it.

use ndarray::{ArrayD, IxDyn};
use serde_json::json;
use tempfile::TempDir;
use voxel_source::{
    ArraySource, BatchProvider, BatchRequest, CompressionMethod, DataKind, DataType,
    DatasetHeader, FileSystemStore, Roi, SourceConfig, SourceError, VolumeData,
};

/// Segment ids well past the range f32 represents exactly
const LABEL_BASE: u64 = 1 << 40;

fn ramp(shape: &[usize]) -> ArrayD<u8> {
    let n: usize = shape.iter().product();
    ArrayD::from_shape_vec(IxDyn(shape), (0..n).map(|v| (v % 251) as u8).collect()).unwrap()
}

/// Writes a 3D sample whose label volume is two sections shorter than raw
async fn write_sample(dir: &TempDir, with_resolution: bool) -> anyhow::Result<FileSystemStore> {
    let store = FileSystemStore::new(dir.path());

    let mut raw_header = DatasetHeader::new(vec![12, 16, 16], DataType::U8)
        .with_chunk_shape(vec![4, 8, 8])
        .with_compression(CompressionMethod::Zstd);
    if with_resolution {
        raw_header = raw_header.with_resolution(&[40.0, 4.0, 4.0]);
    }
    store
        .write_dataset("volumes/raw", &ramp(&[12, 16, 16]).into(), raw_header)
        .await?;

    let labels = ramp(&[10, 16, 16]).mapv(|v| LABEL_BASE + v as u64 % 7);
    store
        .write_dataset(
            "volumes/labels",
            &labels.into(),
            DatasetHeader::new(vec![10, 16, 16], DataType::U64)
                .with_compression(CompressionMethod::Deflate),
        )
        .await?;

    let mut mask = ArrayD::<u8>::zeros(IxDyn(&[12, 16, 16]));
    mask[[3, 4, 5]] = 1;
    mask[[7, 10, 2]] = 1;
    store
        .write_dataset(
            "volumes/mask",
            &mask.into(),
            DatasetHeader::new(vec![12, 16, 16], DataType::U8)
                .with_compression(CompressionMethod::Rle),
        )
        .await?;

    Ok(store)
}

fn config() -> SourceConfig {
    SourceConfig::new("volumes/raw")
        .with_gt("volumes/labels")
        .with_gt_mask("volumes/mask")
}

#[tokio::test]
async fn test_setup_from_filesystem() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let store = write_sample(&dir, true).await?;
    let mut source = ArraySource::new(store, config());
    source.setup().await?;

    let spec = source.spec()?;
    assert_eq!(spec.roi, Roi::from_shape(vec![10, 16, 16])?);
    assert_eq!(
        spec.gt_roi,
        Some(Roi::new(vec![3, 4, 2], vec![5, 7, 4])?)
    );
    assert!(spec.has_gt());
    assert!(spec.has_gt_mask());
    Ok(())
}

#[tokio::test]
async fn test_batch_with_context_padding() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let store = write_sample(&dir, true).await?;
    let mut source = ArraySource::new(store, config());
    source.setup().await?;

    let output = Roi::new(vec![2, 4, 4], vec![4, 8, 8])?;
    let input = output.grow(&[2, 4, 4], &[2, 4, 4])?;
    let request = BatchRequest::new(input.clone(), output.clone())
        .with(DataKind::GtLabels)
        .with(DataKind::GtMask);
    let batch = source.request_batch(&request).await?;

    let raw = batch.get(DataKind::Raw).expect("raw volume");
    assert_eq!(raw.data.shape(), &[8, 16, 16]);
    let expected = ramp(&[12, 16, 16])
        .slice_each_axis(|ax| {
            let (lo, hi) = input.bounding_box()[ax.axis.index()];
            ndarray::Slice::from(lo as isize..hi as isize)
        })
        .to_owned();
    assert_eq!(raw.data, VolumeData::from(expected));

    let labels = batch.get(DataKind::GtLabels).expect("labels volume");
    assert_eq!(labels.data.shape(), &[4, 8, 8]);
    let ids = labels.data.as_array::<u64>().expect("u64 labels");
    assert!(ids.iter().all(|&v| (LABEL_BASE..LABEL_BASE + 7).contains(&v)));
    assert_ne!(ids[[0, 0, 0]], ids[[0, 0, 1]]);

    let mask = batch.get(DataKind::GtMask).expect("mask volume");
    let mask = mask.data.as_array::<u8>().expect("u8 mask");
    assert_eq!(mask.iter().map(|&v| v as u32).sum::<u32>(), 1);
    assert_eq!(mask[[1, 0, 1]], 1);

    assert_eq!(batch.resolution.values, vec![40.0, 4.0, 4.0]);
    assert_eq!(batch.profiling.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_missing_resolution_still_produces_batch() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let store = write_sample(&dir, false).await?;
    let mut source = ArraySource::new(store, SourceConfig::new("volumes/raw"));
    source.setup().await?;
    assert_eq!(source.spec()?.roi, Roi::from_shape(vec![12, 16, 16])?);

    let roi = Roi::new(vec![10, 0, 0], vec![2, 2, 2])?;
    let batch = source.request_batch(&BatchRequest::new(roi.clone(), roi)).await?;
    assert!(batch.resolution.is_default());
    assert_eq!(batch.resolution.values, vec![1.0; 3]);
    Ok(())
}

#[tokio::test]
async fn test_config_file_and_errors() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let store = write_sample(&dir, true).await?;

    let config_path = dir.path().join("source.json");
    tokio::fs::write(
        &config_path,
        serde_json::to_vec(&json!({
            "raw_dataset": "volumes/raw",
            "gt_mask_dataset": "volumes/mask",
            "resolution": [8, 8, 8]
        }))?,
    )
    .await?;
    let mut source = ArraySource::new(store, SourceConfig::from_file(&config_path).await?);
    source.setup().await?;

    let area = Roi::from_shape(vec![4, 4, 4])?;
    let err = source
        .request_batch(&BatchRequest::new(area.clone(), area.clone()).with(DataKind::GtLabels))
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Capability { kind: DataKind::GtLabels }));

    let batch = source
        .request_batch(&BatchRequest::new(area.clone(), area).with(DataKind::GtMask))
        .await?;
    assert_eq!(batch.resolution.values, vec![8.0, 8.0, 8.0]);

    let corrupt = dir.path().join("volumes/raw/chunks/0.0.0");
    tokio::fs::write(&corrupt, b"not zstd").await?;
    let area = Roi::from_shape(vec![1, 1, 1])?;
    let err = source
        .request_batch(&BatchRequest::new(area.clone(), area))
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::StorageRead(_)));

    // Chunks away from the damage still serve
    let elsewhere = Roi::new(vec![8, 8, 8], vec![2, 4, 4])?;
    let batch = source
        .request_batch(&BatchRequest::new(elsewhere.clone(), elsewhere))
        .await?;
    assert_eq!(batch.get(DataKind::Raw).expect("raw volume").data.shape(), &[2, 4, 4]);
    Ok(())
}

#[tokio::test]
async fn test_missing_dataset_fails_setup() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let store = write_sample(&dir, true).await?;
    let mut source = ArraySource::new(store, SourceConfig::new("volumes/raw").with_gt("volumes/gt"));
    let err = source.setup().await.unwrap_err();
    assert!(matches!(err, SourceError::Configuration(_)));
    assert!(err.to_string().contains("volumes/gt"));
    Ok(())
}
