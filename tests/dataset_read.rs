//! End-to-end sectioned reads against in-memory and file-backed stores.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hyperslab::array::{DataKind, TypedArray, Value};
use hyperslab::chunk::{
    ChunkDescriptor, ChunkedDataset, FilterSpec, MissingChunkPolicy, ReadError, ReadOptions,
    ReadStatus,
};
use hyperslab::section::{Range, Section};
use hyperslab::storage::{
    ChunkLayout, FileRangeReader, MemoryChunkStore, RangeReader, StorageError, StorageLayoutError,
};

/// Chunk payloads of a 10-element int dataset with chunks of 4, stored
/// full-extent: chunk 2 is ragged and padded past the array bound.
fn chunk_payloads_1d() -> Vec<(Vec<u64>, Vec<u8>)> {
    [0u64, 1, 2]
        .into_iter()
        .zip([0i32, 4, 8])
        .map(|(chunk, first)| {
            let bytes = (first..first + 4).flat_map(i32::to_ne_bytes).collect();
            (vec![chunk], bytes)
        })
        .collect()
}

fn store_1d() -> Arc<MemoryChunkStore> {
    let store = MemoryChunkStore::new();
    for (chunk, bytes) in chunk_payloads_1d() {
        store.insert_chunk(&chunk, &bytes, Vec::new());
    }
    Arc::new(store)
}

fn dataset_1d() -> ChunkedDataset<MemoryChunkStore> {
    ChunkedDataset::new(store_1d(), vec![10], vec![4], Value::Int(-1)).unwrap()
}

/// A 6x6 int dataset with 4x4 chunks, element value `i * 6 + j`, chunk
/// padding filled with a sentinel that must never surface.
fn store_2d() -> Arc<MemoryChunkStore> {
    let store = MemoryChunkStore::new();
    for ci in 0..2u64 {
        for cj in 0..2u64 {
            let mut bytes = Vec::new();
            for a in 0..4u64 {
                for b in 0..4u64 {
                    let (i, j) = (ci * 4 + a, cj * 4 + b);
                    let value = if i < 6 && j < 6 { (i * 6 + j) as i32 } else { -99 };
                    bytes.extend_from_slice(&value.to_ne_bytes());
                }
            }
            store.insert_chunk(&[ci, cj], &bytes, Vec::new());
        }
    }
    Arc::new(store)
}

fn dataset_2d() -> ChunkedDataset<MemoryChunkStore> {
    ChunkedDataset::new(store_2d(), vec![6, 6], vec![4, 4], Value::Int(-1)).unwrap()
}

#[test]
fn read_full_1d() {
    let result = dataset_1d()
        .read(&Section::from_shape(&[10]).unwrap())
        .unwrap();
    assert_eq!(result.shape(), &[10]);
    assert_eq!(result.to_vec::<i32>().unwrap(), (0..10).collect::<Vec<_>>());
}

#[test]
fn read_strided_1d() {
    // Indices 2, 4, 6: the request spans a chunk boundary mid-stride.
    let section = Section::new(vec![Range::new(2, 7, 2).unwrap()]);
    let result = dataset_1d().read(&section).unwrap();
    assert_eq!(result.to_vec::<i32>().unwrap(), vec![2, 4, 6]);
}

#[test]
fn read_across_chunk_boundaries() {
    let section = Section::new(vec![Range::contiguous(3, 9).unwrap()]);
    let result = dataset_1d().read(&section).unwrap();
    assert_eq!(
        result.to_vec::<i32>().unwrap(),
        vec![3, 4, 5, 6, 7, 8, 9]
    );
}

#[test]
fn read_rejects_invalid_section() {
    let section = Section::new(vec![Range::contiguous(0, 10).unwrap()]);
    assert!(matches!(
        dataset_1d().read(&section),
        Err(ReadError::InvalidRange(_))
    ));
}

#[test]
fn read_2d_strided() {
    // Rows 1, 3, 5 and columns 0, 2, 4.
    let section = Section::new(vec![
        Range::new(1, 5, 2).unwrap(),
        Range::new(0, 4, 2).unwrap(),
    ]);
    let result = dataset_2d().read(&section).unwrap();
    assert_eq!(result.shape(), &[3, 3]);
    assert_eq!(
        result.to_vec::<i32>().unwrap(),
        vec![6, 8, 10, 18, 20, 22, 30, 32, 34]
    );
}

#[test]
fn par_read_matches_read() {
    let dataset = dataset_2d();
    let section = Section::new(vec![
        Range::new(0, 5, 3).unwrap(),
        Range::contiguous(1, 5).unwrap(),
    ]);
    let serial = dataset.read(&section).unwrap();
    let parallel = dataset.par_read(&section).unwrap();
    assert_eq!(
        parallel.to_vec::<i32>().unwrap(),
        serial.to_vec::<i32>().unwrap()
    );
}

#[test]
fn missing_chunk_reads_as_fill_value() {
    let store = MemoryChunkStore::new();
    for (chunk, bytes) in chunk_payloads_1d() {
        if chunk != [1] {
            store.insert_chunk(&chunk, &bytes, Vec::new());
        }
    }
    let dataset =
        ChunkedDataset::new(Arc::new(store), vec![10], vec![4], Value::Int(-1)).unwrap();
    let result = dataset
        .read(&Section::from_shape(&[10]).unwrap())
        .unwrap();
    assert_eq!(
        result.to_vec::<i32>().unwrap(),
        vec![0, 1, 2, 3, -1, -1, -1, -1, 8, 9]
    );
}

#[test]
fn missing_chunk_policy_error() {
    let store = MemoryChunkStore::new();
    let dataset = ChunkedDataset::new(Arc::new(store), vec![10], vec![4], Value::Int(-1))
        .unwrap()
        .with_missing_chunk_policy(MissingChunkPolicy::Error);
    assert!(matches!(
        dataset.read(&Section::from_shape(&[10]).unwrap()),
        Err(ReadError::Layout(StorageLayoutError::MissingChunk(indices))) if indices == [0]
    ));
}

#[test]
fn corrupt_chunk_size_is_surfaced() {
    let store = MemoryChunkStore::new();
    store.insert_chunk(&[0], &[1, 2, 3], Vec::new());
    let dataset =
        ChunkedDataset::new(Arc::new(store), vec![10], vec![4], Value::Int(-1)).unwrap();
    assert!(matches!(
        dataset.read(&Section::new(vec![Range::contiguous(0, 1).unwrap()])),
        Err(ReadError::UnexpectedChunkSize {
            expected: 16,
            got: 3,
            ..
        })
    ));
}

#[test]
fn read_into_checks_destination() {
    let dataset = dataset_1d();
    let section = Section::new(vec![Range::contiguous(0, 3).unwrap()]);
    let options = ReadOptions::new();

    let mut wrong_kind = TypedArray::zeros(DataKind::Long, &[4]);
    assert!(matches!(
        dataset.read_into(&section, &mut wrong_kind, &options),
        Err(ReadError::DestinationKind(DataKind::Long, DataKind::Int))
    ));

    let mut wrong_shape = TypedArray::zeros(DataKind::Int, &[5]);
    assert!(matches!(
        dataset.read_into(&section, &mut wrong_shape, &options),
        Err(ReadError::DestinationShape(_, _))
    ));

    let mut dest = TypedArray::zeros(DataKind::Int, &[4]);
    assert_eq!(
        dataset.read_into(&section, &mut dest, &options).unwrap(),
        ReadStatus::Complete
    );
    assert_eq!(dest.to_vec::<i32>().unwrap(), vec![0, 1, 2, 3]);
}

#[test]
fn dataset_create_validation() {
    let store = Arc::new(MemoryChunkStore::new());
    assert!(matches!(
        ChunkedDataset::new(Arc::clone(&store), vec![10], vec![4, 4], Value::Int(0)),
        Err(hyperslab::chunk::DatasetCreateError::IncompatibleRank(2, 1))
    ));
    assert!(matches!(
        ChunkedDataset::new(Arc::clone(&store), vec![10], vec![0], Value::Int(0)),
        Err(hyperslab::chunk::DatasetCreateError::ZeroChunkLength(0))
    ));
    assert!(matches!(
        ChunkedDataset::new(store, vec![10], vec![4], Value::Opaque(vec![1])),
        Err(hyperslab::chunk::DatasetCreateError::UnsizedKind(DataKind::Opaque))
    ));
}

/// A store whose first byte fetch trips the cancellation flag, so the read
/// observes it at the next chunk boundary.
struct TripwireStore {
    inner: MemoryChunkStore,
    flag: Arc<AtomicBool>,
}

impl RangeReader for TripwireStore {
    fn read_bytes(&self, offset: u64, length: u64) -> Result<Vec<u8>, StorageError> {
        self.flag.store(true, Ordering::Relaxed);
        self.inner.read_bytes(offset, length)
    }
}

impl ChunkLayout for TripwireStore {
    fn resolve(
        &self,
        chunk_indices: &[u64],
    ) -> Result<Option<ChunkDescriptor>, StorageLayoutError> {
        self.inner.resolve(chunk_indices)
    }
}

#[test]
fn cancellation_keeps_whole_chunks() {
    let inner = MemoryChunkStore::new();
    for (chunk, bytes) in chunk_payloads_1d() {
        inner.insert_chunk(&chunk, &bytes, Vec::new());
    }
    let flag = Arc::new(AtomicBool::new(false));
    let store = Arc::new(TripwireStore {
        inner,
        flag: Arc::clone(&flag),
    });
    let dataset = ChunkedDataset::new(store, vec![10], vec![4], Value::Int(-1)).unwrap();

    let mut dest = TypedArray::full(&Value::Int(-1), &[10]);
    let status = dataset
        .read_into(
            &Section::from_shape(&[10]).unwrap(),
            &mut dest,
            &ReadOptions::new().cancel_flag(&flag),
        )
        .unwrap();
    assert_eq!(status, ReadStatus::Cancelled);
    // The first chunk completed before the flag was observed; nothing after
    // it was touched, and no chunk is torn.
    assert_eq!(
        dest.to_vec::<i32>().unwrap(),
        vec![0, 1, 2, 3, -1, -1, -1, -1, -1, -1]
    );
}

#[test]
fn cancelled_before_start_writes_nothing() {
    let flag = AtomicBool::new(true);
    let mut dest = TypedArray::full(&Value::Int(-1), &[10]);
    let status = dataset_1d()
        .read_into(
            &Section::from_shape(&[10]).unwrap(),
            &mut dest,
            &ReadOptions::new().cancel_flag(&flag),
        )
        .unwrap();
    assert_eq!(status, ReadStatus::Cancelled);
    assert_eq!(dest.to_vec::<i32>().unwrap(), vec![-1; 10]);
}

/// A file-backed store: byte ranges from a [`FileRangeReader`], chunk
/// addresses from a table built while the file was written.
struct FileStore {
    reader: FileRangeReader,
    table: BTreeMap<Vec<u64>, ChunkDescriptor>,
}

impl RangeReader for FileStore {
    fn read_bytes(&self, offset: u64, length: u64) -> Result<Vec<u8>, StorageError> {
        self.reader.read_bytes(offset, length)
    }
}

impl ChunkLayout for FileStore {
    fn resolve(
        &self,
        chunk_indices: &[u64],
    ) -> Result<Option<ChunkDescriptor>, StorageLayoutError> {
        Ok(self.table.get(chunk_indices).cloned())
    }
}

#[test]
fn read_from_file_backed_store() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    let mut table = BTreeMap::new();
    let mut byte_offset = 0u64;
    for (chunk, bytes) in chunk_payloads_1d() {
        file.write_all(&bytes).unwrap();
        table.insert(
            chunk.clone(),
            ChunkDescriptor {
                chunk_indices: chunk,
                byte_offset,
                stored_size: bytes.len() as u64,
                filters: Vec::new(),
            },
        );
        byte_offset += bytes.len() as u64;
    }
    file.flush().unwrap();

    let store = Arc::new(FileStore {
        reader: FileRangeReader::open(file.path()).unwrap(),
        table,
    });
    let dataset = ChunkedDataset::new(store, vec![10], vec![4], Value::Int(-1)).unwrap();
    let section = Section::new(vec![Range::new(1, 9, 3).unwrap()]);
    let result = dataset.read(&section).unwrap();
    assert_eq!(result.to_vec::<i32>().unwrap(), vec![1, 4, 7]);
}

#[cfg(feature = "deflate")]
#[test]
fn read_deflate_compressed_chunks() {
    use hyperslab::storage::DeflatePipeline;

    let store = MemoryChunkStore::new();
    for (chunk, bytes) in chunk_payloads_1d() {
        let encoded = DeflatePipeline::encode(&bytes, 6).unwrap();
        store.insert_chunk(&chunk, &encoded, vec![FilterSpec::new(FilterSpec::DEFLATE)]);
    }
    let dataset = ChunkedDataset::new(Arc::new(store), vec![10], vec![4], Value::Int(-1))
        .unwrap()
        .with_filter_pipeline(Arc::new(DeflatePipeline));
    let result = dataset
        .read(&Section::from_shape(&[10]).unwrap())
        .unwrap();
    assert_eq!(result.to_vec::<i32>().unwrap(), (0..10).collect::<Vec<_>>());
}
