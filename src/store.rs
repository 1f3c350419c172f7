//! Array stores: read-only access to named N-dimensional datasets
//!
//! A store hands out scoped [`StoreHandle`] sessions. Every read performed
//! while serving one batch goes through the same handle, and the session is
//! released when the handle is dropped, on success and failure alike.

use crate::array::{decode_array, with_element_type, Element, VolumeData};
use crate::compression::{get_codec, Codec};
use crate::error::{Result, SourceError};
use crate::layout::ChunkGrid;
use crate::metadata::DatasetHeader;
use crate::types::DataType;
use crate::utils::{check_region, format_bytes};
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::try_join_all;
use ndarray::{ArrayD, IxDyn, Slice};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};

const HEADER_FILE: &str = "header.json";
const CHUNK_DIR: &str = "chunks";
const COMPRESSION_LEVEL: u8 = 6;

/// A container of named datasets that can be opened for reading
#[async_trait]
pub trait ArrayStore: Send + Sync {
    /// Open a read session
    async fn open(&self) -> Result<Box<dyn StoreHandle>>;

    /// Identifier of the underlying container, used in logs and errors
    fn identifier(&self) -> &str;
}

/// An open read session on an [`ArrayStore`]
#[async_trait]
pub trait StoreHandle: Send + Sync {
    /// Check whether a dataset exists
    async fn has(&self, key: &str) -> Result<bool>;

    /// Shape of a dataset
    async fn shape(&self, key: &str) -> Result<Vec<usize>>;

    /// Read the per-axis `[lo, hi)` region of a dataset in its stored
    /// element type
    async fn read_region(&self, key: &str, bounds: &[(i64, i64)]) -> Result<VolumeData>;

    /// Read a whole dataset
    async fn read_full(&self, key: &str) -> Result<VolumeData> {
        let bounds: Vec<(i64, i64)> = self
            .shape(key)
            .await?
            .into_iter()
            .map(|len| (0, len as i64))
            .collect();
        self.read_region(key, &bounds).await
    }

    /// Look up an attribute attached to a dataset
    async fn attribute(&self, key: &str, name: &str) -> Result<Option<Value>>;
}

fn missing(key: &str, identifier: &str) -> SourceError {
    SourceError::StorageRead(format!("dataset '{}' not found in {}", key, identifier))
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// One recorded `read_region` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecord {
    pub key: String,
    pub bounds: Vec<(i64, i64)>,
}

/// Session and read counters of a [`MemoryStore`]
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub opens: usize,
    pub releases: usize,
    pub reads: Vec<ReadRecord>,
}

impl StoreStats {
    /// Sessions opened but not yet released
    pub fn open_sessions(&self) -> usize {
        self.opens.saturating_sub(self.releases)
    }
}

#[derive(Debug, Clone)]
struct MemoryDataset {
    data: Arc<VolumeData>,
    attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    datasets: RwLock<BTreeMap<String, MemoryDataset>>,
    failing: RwLock<BTreeSet<String>>,
    stats: Mutex<StoreStats>,
}

/// Store that keeps datasets in memory and records how it is accessed
#[derive(Debug, Clone)]
pub struct MemoryStore {
    identifier: String,
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            inner: Arc::new(MemoryInner::default()),
        }
    }

    /// Add or replace a dataset
    pub fn insert(&self, key: impl Into<String>, data: impl Into<VolumeData>) {
        self.inner.datasets.write().insert(
            key.into(),
            MemoryDataset {
                data: Arc::new(data.into()),
                attributes: BTreeMap::new(),
            },
        );
    }

    /// Builder form of [`MemoryStore::insert`]
    pub fn with_dataset(self, key: impl Into<String>, data: impl Into<VolumeData>) -> Self {
        self.insert(key, data);
        self
    }

    /// Attach an attribute to an existing dataset
    pub fn set_attribute(&self, key: &str, name: impl Into<String>, value: Value) -> Result<()> {
        let mut datasets = self.inner.datasets.write();
        let dataset = datasets
            .get_mut(key)
            .ok_or_else(|| missing(key, &self.identifier))?;
        dataset.attributes.insert(name.into(), value);
        Ok(())
    }

    /// Make every subsequent read of `key` fail with a storage error
    pub fn fail_reads_of(&self, key: impl Into<String>) {
        self.inner.failing.write().insert(key.into());
    }

    pub fn stats(&self) -> StoreStats {
        self.inner.stats.lock().clone()
    }

    pub fn reset_stats(&self) {
        *self.inner.stats.lock() = StoreStats::default();
    }
}

#[async_trait]
impl ArrayStore for MemoryStore {
    async fn open(&self) -> Result<Box<dyn StoreHandle>> {
        self.inner.stats.lock().opens += 1;
        trace!(store = %self.identifier, "opened memory session");
        Ok(Box::new(MemoryHandle {
            identifier: self.identifier.clone(),
            inner: Arc::clone(&self.inner),
        }))
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

struct MemoryHandle {
    identifier: String,
    inner: Arc<MemoryInner>,
}

impl MemoryHandle {
    fn dataset(&self, key: &str) -> Result<MemoryDataset> {
        self.inner
            .datasets
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| missing(key, &self.identifier))
    }
}

#[async_trait]
impl StoreHandle for MemoryHandle {
    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.inner.datasets.read().contains_key(key))
    }

    async fn shape(&self, key: &str) -> Result<Vec<usize>> {
        Ok(self.dataset(key)?.data.shape().to_vec())
    }

    async fn read_region(&self, key: &str, bounds: &[(i64, i64)]) -> Result<VolumeData> {
        self.inner.stats.lock().reads.push(ReadRecord {
            key: key.to_string(),
            bounds: bounds.to_vec(),
        });
        if self.inner.failing.read().contains(key) {
            return Err(SourceError::StorageRead(format!(
                "simulated fault reading '{}'",
                key
            )));
        }
        self.dataset(key)?.data.slice(bounds)
    }

    async fn attribute(&self, key: &str, name: &str) -> Result<Option<Value>> {
        Ok(self.dataset(key)?.attributes.get(name).cloned())
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.inner.stats.lock().releases += 1;
        trace!(store = %self.identifier, "released memory session");
    }
}

// ---------------------------------------------------------------------------
// File system store
// ---------------------------------------------------------------------------

/// Store rooted at a directory with one sub-directory per dataset.
///
/// A dataset `volumes/raw` lives in `<root>/volumes/raw/` as a
/// `header.json` describing shape, chunk shape, element type, compression
/// and attributes, plus one compressed row-major file per chunk under
/// `chunks/`, named by its grid coordinates (`chunks/0.1.0`). Reads only
/// touch the chunks that intersect the requested region.
#[derive(Debug, Clone)]
pub struct FileSystemStore {
    root: PathBuf,
    identifier: String,
}

impl FileSystemStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            identifier: root.display().to_string(),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a dataset. Used to prepare sources; providers never write.
    pub async fn write_dataset(
        &self,
        key: &str,
        data: &VolumeData,
        header: DatasetHeader,
    ) -> Result<()> {
        if header.shape != data.shape() {
            return Err(SourceError::Configuration(format!(
                "dataset '{}' has shape {:?}, header says {:?}",
                key,
                data.shape(),
                header.shape
            )));
        }
        if header.data_type != data.data_type() {
            return Err(SourceError::Configuration(format!(
                "dataset '{}' holds {} elements, header says {}",
                key,
                data.data_type(),
                header.data_type
            )));
        }
        let grid = header.chunk_grid()?;
        let codec = get_codec(header.compression);

        let dir = dataset_dir(&self.root, key)?;
        let chunk_dir = dir.join(CHUNK_DIR);
        fs::create_dir_all(&chunk_dir).await?;

        let header_json = serde_json::to_vec_pretty(&header)?;
        fs::write(dir.join(HEADER_FILE), header_json).await?;

        let mut stored = 0;
        for coords in grid.all_chunks() {
            let bounds: Vec<(i64, i64)> = grid
                .chunk_range(&coords)
                .into_iter()
                .map(|(lo, hi)| (lo as i64, hi as i64))
                .collect();
            let chunk = data.slice(&bounds)?;
            let compressed = codec.compress(&chunk.to_le_bytes(), COMPRESSION_LEVEL)?;

            let mut file = fs::File::create(chunk_dir.join(ChunkGrid::chunk_key(&coords))).await?;
            file.write_all(&compressed).await?;
            file.flush().await?;
            stored += compressed.len();
        }

        debug!(
            key,
            shape = ?header.shape,
            chunks = grid.chunk_count(),
            stored = %format_bytes(stored),
            "wrote dataset"
        );
        Ok(())
    }
}

#[async_trait]
impl ArrayStore for FileSystemStore {
    async fn open(&self) -> Result<Box<dyn StoreHandle>> {
        let meta = fs::metadata(&self.root).await.map_err(|e| {
            SourceError::StorageRead(format!("cannot open {}: {}", self.identifier, e))
        })?;
        if !meta.is_dir() {
            return Err(SourceError::StorageRead(format!(
                "{} is not a directory",
                self.identifier
            )));
        }
        trace!(store = %self.identifier, "opened file system session");
        Ok(Box::new(FileSystemHandle {
            root: self.root.clone(),
            identifier: self.identifier.clone(),
            headers: Mutex::new(HashMap::new()),
        }))
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Directory of a dataset key; rejects keys that escape the root
fn dataset_dir(root: &Path, key: &str) -> Result<PathBuf> {
    let relative = Path::new(key);
    let valid = !key.is_empty()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if !valid {
        return Err(SourceError::Configuration(format!(
            "invalid dataset key '{}'",
            key
        )));
    }
    Ok(root.join(relative))
}

struct FileSystemHandle {
    root: PathBuf,
    identifier: String,
    /// Headers read during this session
    headers: Mutex<HashMap<String, Arc<DatasetHeader>>>,
}

impl FileSystemHandle {
    async fn header(&self, key: &str) -> Result<Arc<DatasetHeader>> {
        let cached = self.headers.lock().get(key).cloned();
        if let Some(header) = cached {
            return Ok(header);
        }

        let path = dataset_dir(&self.root, key)?.join(HEADER_FILE);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(missing(key, &self.identifier))
            }
            Err(e) => return Err(SourceError::Io(e)),
        };
        let header = Arc::new(DatasetHeader::from_json(&bytes)?);
        self.headers
            .lock()
            .insert(key.to_string(), Arc::clone(&header));
        Ok(header)
    }

    async fn chunk_payload(&self, key: &str, coords: &[usize]) -> Result<Bytes> {
        let path = dataset_dir(&self.root, key)?
            .join(CHUNK_DIR)
            .join(ChunkGrid::chunk_key(coords));
        let data = fs::read(&path)
            .await
            .map_err(|e| SourceError::StorageRead(format!("reading {}: {}", path.display(), e)))?;
        Ok(Bytes::from(data))
    }
}

/// Decode the given chunks and copy their parts inside `region` into one array
fn assemble_region<T: Element>(
    key: &str,
    grid: &ChunkGrid,
    codec: &dyn Codec,
    region: &[(usize, usize)],
    chunks: &[(Vec<usize>, Bytes)],
) -> Result<ArrayD<T>> {
    let out_shape: Vec<usize> = region.iter().map(|&(lo, hi)| hi - lo).collect();
    let mut out = ArrayD::<T>::zeros(IxDyn(&out_shape));

    for (coords, compressed) in chunks {
        let range = grid.chunk_range(coords);
        let extent: Vec<usize> = range.iter().map(|&(lo, hi)| hi - lo).collect();
        let expected = extent.iter().product::<usize>() * T::DATA_TYPE.size_in_bytes();
        let chunk_error = |e: SourceError| {
            SourceError::StorageRead(format!(
                "dataset '{}' chunk {}: {}",
                key,
                ChunkGrid::chunk_key(coords),
                e
            ))
        };
        let raw = codec.decompress(compressed, expected).map_err(chunk_error)?;
        let chunk = decode_array::<T>(&extent, &raw).map_err(chunk_error)?;

        let overlap: Vec<(usize, usize)> = range
            .iter()
            .zip(region)
            .map(|(&(c_lo, c_hi), &(r_lo, r_hi))| (c_lo.max(r_lo), c_hi.min(r_hi)))
            .collect();
        let source = chunk.slice_each_axis(|ax| {
            let axis = ax.axis.index();
            let (lo, hi) = overlap[axis];
            Slice::from(lo - range[axis].0..hi - range[axis].0)
        });
        out.slice_each_axis_mut(|ax| {
            let axis = ax.axis.index();
            let (lo, hi) = overlap[axis];
            Slice::from(lo - region[axis].0..hi - region[axis].0)
        })
        .assign(&source);
    }
    Ok(out)
}

fn assemble_volume(
    key: &str,
    header: &DatasetHeader,
    grid: &ChunkGrid,
    region: &[(usize, usize)],
    chunks: &[(Vec<usize>, Bytes)],
) -> Result<VolumeData> {
    let codec = get_codec(header.compression);
    let data_type: DataType = header.data_type;
    with_element_type!(data_type, T => {
        assemble_region::<T>(key, grid, codec.as_ref(), region, chunks).map(VolumeData::from)
    })
}

#[async_trait]
impl StoreHandle for FileSystemHandle {
    async fn has(&self, key: &str) -> Result<bool> {
        let path = dataset_dir(&self.root, key)?.join(HEADER_FILE);
        Ok(fs::try_exists(&path).await?)
    }

    async fn shape(&self, key: &str) -> Result<Vec<usize>> {
        Ok(self.header(key).await?.shape.clone())
    }

    async fn read_region(&self, key: &str, bounds: &[(i64, i64)]) -> Result<VolumeData> {
        let header = self.header(key).await?;
        let region = check_region(&header.shape, bounds)?;
        let grid = header.chunk_grid()?;
        let coords = grid.overlapping(&region);

        let payloads = try_join_all(coords.iter().map(|c| self.chunk_payload(key, c))).await?;
        let chunks: Vec<(Vec<usize>, Bytes)> = coords.into_iter().zip(payloads).collect();

        debug!(
            key,
            ?bounds,
            chunks = chunks.len(),
            payload = %format_bytes(chunks.iter().map(|(_, b)| b.len()).sum()),
            "read region"
        );
        assemble_volume(key, &header, &grid, &region, &chunks)
    }

    async fn attribute(&self, key: &str, name: &str) -> Result<Option<Value>> {
        Ok(self.header(key).await?.attribute(name).cloned())
    }
}

impl Drop for FileSystemHandle {
    fn drop(&mut self) {
        trace!(store = %self.identifier, "released file system session");
    }
}
