//! Chunk layout of stored datasets
//!
//! A dataset is split into a regular grid of chunks, each compressed and
//! stored on its own. Chunks on the upper edge of an axis are trimmed to
//! the dataset extent.

use crate::error::{Result, SourceError};

/// Default chunk length along every axis
pub const DEFAULT_CHUNK_LEN: usize = 64;

/// Default chunk shape for a dataset of `shape`
pub fn default_chunk_shape(shape: &[usize]) -> Vec<usize> {
    shape
        .iter()
        .map(|&len| len.clamp(1, DEFAULT_CHUNK_LEN))
        .collect()
}

/// Regular chunk grid over a dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkGrid {
    shape: Vec<usize>,
    chunk_shape: Vec<usize>,
}

impl ChunkGrid {
    pub fn new(shape: Vec<usize>, chunk_shape: Vec<usize>) -> Result<Self> {
        if shape.is_empty() {
            return Err(SourceError::Metadata(
                "datasets need at least one axis".to_string(),
            ));
        }
        if chunk_shape.len() != shape.len() {
            return Err(SourceError::DimensionMismatch {
                expected: shape.len(),
                found: chunk_shape.len(),
            });
        }
        if chunk_shape.contains(&0) {
            return Err(SourceError::Metadata(format!(
                "chunk shape {:?} has an empty axis",
                chunk_shape
            )));
        }
        Ok(Self { shape, chunk_shape })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn chunk_shape(&self) -> &[usize] {
        &self.chunk_shape
    }

    /// Number of chunks along each axis
    pub fn grid_shape(&self) -> Vec<usize> {
        self.shape
            .iter()
            .zip(&self.chunk_shape)
            .map(|(&len, &chunk)| len.div_ceil(chunk))
            .collect()
    }

    pub fn chunk_count(&self) -> usize {
        self.grid_shape().iter().product()
    }

    /// Element range `[start, end)` covered by a chunk on every axis
    pub fn chunk_range(&self, coords: &[usize]) -> Vec<(usize, usize)> {
        coords
            .iter()
            .zip(self.chunk_shape.iter().zip(&self.shape))
            .map(|(&coord, (&chunk, &len))| {
                let start = coord * chunk;
                (start, (start + chunk).min(len))
            })
            .collect()
    }

    /// Coordinates of every chunk, row-major
    pub fn all_chunks(&self) -> Vec<Vec<usize>> {
        let min = vec![0; self.shape.len()];
        iterate_range(&min, &self.grid_shape())
    }

    /// Coordinates of the chunks intersecting the element region `[lo, hi)`
    pub fn overlapping(&self, region: &[(usize, usize)]) -> Vec<Vec<usize>> {
        if region.iter().any(|&(lo, hi)| lo >= hi) {
            return Vec::new();
        }
        let min: Vec<usize> = region
            .iter()
            .zip(&self.chunk_shape)
            .map(|(&(lo, _), &chunk)| lo / chunk)
            .collect();
        let max: Vec<usize> = region
            .iter()
            .zip(&self.chunk_shape)
            .map(|(&(_, hi), &chunk)| (hi - 1) / chunk + 1)
            .collect();
        iterate_range(&min, &max)
    }

    /// Storage key of a chunk, e.g. `0.2.1`
    pub fn chunk_key(coords: &[usize]) -> String {
        coords
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Row-major walk over the coordinates in `[min, max)`
fn iterate_range(min: &[usize], max: &[usize]) -> Vec<Vec<usize>> {
    if min.iter().zip(max).any(|(lo, hi)| lo >= hi) {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut coords = min.to_vec();
    loop {
        out.push(coords.clone());

        let mut dim = coords.len();
        loop {
            if dim == 0 {
                return out;
            }
            dim -= 1;
            coords[dim] += 1;
            if coords[dim] < max[dim] {
                break;
            }
            coords[dim] = min[dim];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_shape_and_ranges() {
        let grid = ChunkGrid::new(vec![100, 64, 10], vec![64, 64, 4]).unwrap();
        assert_eq!(grid.grid_shape(), vec![2, 1, 3]);
        assert_eq!(grid.chunk_count(), 6);
        assert_eq!(grid.chunk_range(&[1, 0, 2]), vec![(64, 100), (0, 64), (8, 10)]);
        assert_eq!(grid.all_chunks().len(), 6);
        assert_eq!(grid.all_chunks()[1], vec![0, 0, 1]);
    }

    #[test]
    fn test_overlapping_chunks() {
        let grid = ChunkGrid::new(vec![64, 64], vec![16, 16]).unwrap();
        assert_eq!(grid.overlapping(&[(0, 1), (0, 1)]), vec![vec![0, 0]]);
        assert_eq!(
            grid.overlapping(&[(15, 17), (40, 48)]),
            vec![vec![0, 2], vec![1, 2]]
        );
        assert_eq!(grid.overlapping(&[(0, 64), (0, 64)]).len(), 16);
        assert!(grid.overlapping(&[(3, 3), (0, 64)]).is_empty());
    }

    #[test]
    fn test_default_chunk_shape() {
        assert_eq!(default_chunk_shape(&[200, 10, 0]), vec![64, 10, 1]);
    }

    #[test]
    fn test_invalid_grids() {
        assert!(ChunkGrid::new(vec![], vec![]).is_err());
        assert!(ChunkGrid::new(vec![4, 4], vec![4]).is_err());
        assert!(ChunkGrid::new(vec![4], vec![0]).is_err());
    }

    #[test]
    fn test_empty_axis_has_no_chunks() {
        let grid = ChunkGrid::new(vec![0, 8], vec![1, 8]).unwrap();
        assert_eq!(grid.chunk_count(), 0);
        assert!(grid.all_chunks().is_empty());
    }

    #[test]
    fn test_chunk_key() {
        assert_eq!(ChunkGrid::chunk_key(&[0, 2, 1]), "0.2.1");
    }
}
