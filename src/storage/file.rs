//! Byte-range reads over a file.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use parking_lot::Mutex;

use super::{RangeReader, StorageError};

/// A [`RangeReader`] over a single file.
///
/// The file handle is shared behind a lock, so one reader serves concurrent
/// sessions; each read seeks before reading. Short reads past the end of the
/// file are reported as [`StorageError::ShortRead`], not truncated.
#[derive(Debug)]
pub struct FileRangeReader {
    file: Mutex<File>,
}

impl FileRangeReader {
    /// Open `path` for byte-range reads.
    ///
    /// # Errors
    /// Returns [`StorageError`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Ok(Self {
            file: Mutex::new(File::open(path)?),
        })
    }
}

impl RangeReader for FileRangeReader {
    fn read_bytes(&self, offset: u64, length: u64) -> Result<Vec<u8>, StorageError> {
        let mut file = self.file.lock();
        let end = file.metadata()?.len();
        if offset.checked_add(length).map_or(true, |e| e > end) {
            return Err(StorageError::ShortRead {
                offset,
                requested: length,
                got: end.saturating_sub(offset),
            });
        }
        file.seek(SeekFrom::Start(offset))?;
        let mut bytes = vec![0; usize::try_from(length).unwrap_or(usize::MAX)];
        file.read_exact(&mut bytes)?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn file_range_reader() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[10, 20, 30, 40, 50]).unwrap();
        file.flush().unwrap();

        let reader = FileRangeReader::open(file.path()).unwrap();
        assert_eq!(reader.read_bytes(1, 3).unwrap(), vec![20, 30, 40]);
        assert_eq!(reader.read_bytes(0, 5).unwrap(), vec![10, 20, 30, 40, 50]);
        assert!(matches!(
            reader.read_bytes(3, 4),
            Err(StorageError::ShortRead {
                offset: 3,
                requested: 4,
                got: 2
            })
        ));
    }
}
