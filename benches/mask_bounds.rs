use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::{s, ArrayD, IxDyn};
use std::hint::black_box;
use voxel_source::{ground_truth_roi, MaskBounds, VolumeData};

fn sparse_mask(shape: &[usize]) -> ArrayD<u8> {
    let mut mask = ArrayD::zeros(IxDyn(shape));
    for z in (8..shape[0] - 8).step_by(5) {
        mask[[z, z % shape[1], (3 * z) % shape[2]]] = 1;
    }
    mask
}

fn bench_mask_bounds(c: &mut Criterion) {
    let mask = sparse_mask(&[64, 128, 128]);
    let volume = VolumeData::from(mask.clone());

    c.bench_function("ground_truth_roi_full", |b| {
        b.iter(|| ground_truth_roi("mask", black_box(&volume)).unwrap())
    });

    c.bench_function("ground_truth_roi_blockwise", |b| {
        b.iter(|| {
            let mut bounds = MaskBounds::new(3);
            for start in (0..64).step_by(16) {
                let block = mask.slice(s![start..start + 16, .., ..]).into_dyn();
                bounds.observe_block(black_box(block), &[start, 0, 0]);
            }
            bounds.finish().unwrap()
        })
    });
}

criterion_group!(benches, bench_mask_bounds);
criterion_main!(benches);
