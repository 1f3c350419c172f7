//! Example: Write a small labelled sample and serve training batches from it
//!
//! Run with: cargo run --example serve_batches

use ndarray::{ArrayD, IxDyn};
use voxel_source::{
    ArraySource, BatchProvider, BatchRequest, CompressionMethod, DataKind, DataType,
    DatasetHeader, FileSystemStore, Roi, SourceConfig, VolumeData,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Voxel Source Example: Serving Batches");
    println!("=====================================\n");

    // Sample in a temp directory: raw image, segment ids, sparse mask
    let temp_dir = tempfile::tempdir()?;
    let store = FileSystemStore::new(temp_dir.path().join("sample_A"));
    let shape = [40usize, 96, 96];

    let raw = ArrayD::from_shape_fn(IxDyn(&shape), |ix| ((ix[0] * 7 + ix[1] + ix[2]) % 256) as u8);
    let raw_header = DatasetHeader::new(shape.to_vec(), DataType::U8)
        .with_chunk_shape(vec![16, 32, 32])
        .with_compression(CompressionMethod::Zstd)
        .with_resolution(&[40.0, 4.0, 4.0]);
    store
        .write_dataset("volumes/raw", &raw.into(), raw_header)
        .await?;

    // Segment ids past 2^24 are kept exactly
    let labels = ArrayD::from_shape_fn(IxDyn(&shape), |ix| {
        16_777_216u64 + (ix[1] / 16 * 6 + ix[2] / 16) as u64
    });
    let labels_header = DatasetHeader::new(shape.to_vec(), DataType::U64)
        .with_compression(CompressionMethod::Deflate);
    store
        .write_dataset("volumes/labels", &labels.into(), labels_header)
        .await?;

    let mut mask = ArrayD::<u8>::zeros(IxDyn(&shape));
    mask.slice_mut(ndarray::s![10..30, 20..70, 24..80]).fill(1);
    let mask_header = DatasetHeader::new(shape.to_vec(), DataType::U8)
        .with_compression(CompressionMethod::Rle);
    store
        .write_dataset("volumes/mask", &mask.into(), mask_header)
        .await?;
    println!("Wrote sample to: {}", store.root().display());

    let config = SourceConfig::new("volumes/raw")
        .with_gt("volumes/labels")
        .with_gt_mask("volumes/mask");
    let mut source = ArraySource::new(store, config);
    source.setup().await?;

    let spec = source.spec()?;
    println!("Source ROI:        {}", spec.roi);
    if let Some(gt_roi) = &spec.gt_roi {
        println!("Ground-truth ROI:  {}", gt_roi);
    }
    println!();

    // Output centred in the mask, input padded with context
    let output = Roi::new(vec![14, 30, 36], vec![8, 24, 24])?;
    let input = output.grow(&[4, 12, 12], &[4, 12, 12])?;
    let request = BatchRequest::new(input, output)
        .with(DataKind::GtLabels)
        .with(DataKind::GtMask);
    let batch = source.request_batch(&request).await?;

    println!("Batch (resolution {:?}):", batch.resolution.values);
    for kind in batch.kinds() {
        if let Some(volume) = batch.get(kind) {
            println!("  {:<10} {} over {}", kind.key(), volume.data, volume.roi);
        }
    }

    if let Some(VolumeData::U64(ids)) = batch.get(DataKind::GtLabels).map(|v| &v.data) {
        let mut segments: Vec<u64> = ids.iter().copied().collect();
        segments.sort_unstable();
        segments.dedup();
        println!("  {} distinct segments, first id {}", segments.len(), segments[0]);
    }

    for timing in batch.profiling.iter() {
        println!("  {} took {:?}", timing.name(), timing.elapsed());
    }

    Ok(())
}
