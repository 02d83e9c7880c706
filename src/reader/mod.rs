//! Chunk reader
//!
//! Reads single units from the scanned file using positioned reads, so any
//! number of workers can share one open file without coordinating a seek
//! pointer. Reads of distinct units cover disjoint byte ranges and never race.
//!
//! # Example
//!
//! ```no_run
//! use distscan::config::TailPolicy;
//! use distscan::reader::ChunkReader;
//!
//! let reader = ChunkReader::open("/data/samples.bin", 4096, TailPolicy::Truncate)?;
//! let bytes = reader.read_unit(17)?;
//! assert_eq!(bytes.len(), 4096);
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::config::TailPolicy;
use crate::error::ScanError;
use crate::job::builder::chunk_count;
use std::fs::File;
use std::io::ErrorKind;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared, read-only access to the units of one file
///
/// Cloning is cheap: clones share the same underlying file handle.
#[derive(Debug, Clone)]
pub struct ChunkReader {
    /// Open file, shared between clones
    file: Arc<File>,

    /// Path the file was opened from (for error reporting)
    path: PathBuf,

    /// File size observed at open time
    file_size: u64,

    /// Bytes per unit
    mini_chunk_size: u64,

    /// Addressable units
    chunk_count: u64,
}

impl ChunkReader {
    /// Open a file for shared positioned reads
    ///
    /// On Linux the kernel is told to expect random access, since units are
    /// visited in permuted order.
    pub fn open(
        path: impl AsRef<Path>,
        mini_chunk_size: u64,
        tail: TailPolicy,
    ) -> Result<Self, ScanError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| ScanError::Io {
            path: path.clone(),
            source,
        })?;
        let file_size = file
            .metadata()
            .map_err(|source| ScanError::Io {
                path: path.clone(),
                source,
            })?
            .len();

        advise_random(&file, &path);

        let chunk_count = chunk_count(file_size, mini_chunk_size, tail);
        debug!(
            "opened {}: {} bytes, {} units of {} bytes",
            path.display(),
            file_size,
            chunk_count,
            mini_chunk_size
        );

        Ok(Self {
            file: Arc::new(file),
            path,
            file_size,
            mini_chunk_size,
            chunk_count,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn mini_chunk_size(&self) -> u64 {
        self.mini_chunk_size
    }

    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    /// Byte offset of a unit in the file
    #[inline]
    pub fn offset_of(&self, unit: u64) -> u64 {
        unit * self.mini_chunk_size
    }

    /// Number of bytes a unit is expected to hold
    ///
    /// Always `mini_chunk_size`, except for the trailing unit under
    /// [`TailPolicy::Partial`].
    fn expected_len(&self, unit: u64) -> u64 {
        let offset = self.offset_of(unit);
        self.mini_chunk_size.min(self.file_size.saturating_sub(offset))
    }

    /// Read one unit into a freshly allocated buffer
    pub fn read_unit(&self, unit: u64) -> Result<Vec<u8>, ScanError> {
        let mut buf = Vec::with_capacity(self.mini_chunk_size as usize);
        self.read_unit_into(unit, &mut buf)?;
        Ok(buf)
    }

    /// Read one unit and append its bytes to `buf`
    ///
    /// On error `buf` is restored to its previous length.
    ///
    /// # Errors
    ///
    /// - [`ScanError::UnitOutOfBounds`] for indices past the last unit
    /// - [`ScanError::ShortRead`] if the file ends before the unit does
    /// - [`ScanError::Io`] if the read itself fails
    pub fn read_unit_into(&self, unit: u64, buf: &mut Vec<u8>) -> Result<(), ScanError> {
        if unit >= self.chunk_count {
            return Err(ScanError::UnitOutOfBounds {
                unit,
                chunk_count: self.chunk_count,
            });
        }

        let expected = self.expected_len(unit) as usize;
        let start = buf.len();
        buf.resize(start + expected, 0);

        match self.read_full_at(&mut buf[start..], self.offset_of(unit)) {
            Ok(actual) if actual == expected => Ok(()),
            Ok(actual) => {
                buf.truncate(start);
                Err(ScanError::ShortRead {
                    unit,
                    expected,
                    actual,
                })
            }
            Err(source) => {
                buf.truncate(start);
                Err(ScanError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        }
    }

    /// Read until `buf` is full or EOF, retrying partial reads
    fn read_full_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
        let mut total_read = 0;
        while total_read < buf.len() {
            match self.file.read_at(&mut buf[total_read..], offset + total_read as u64) {
                Ok(0) => break, // EOF
                Ok(n) => total_read += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(total_read)
    }
}

#[cfg(target_os = "linux")]
fn advise_random(file: &File, path: &Path) {
    use std::os::unix::io::AsRawFd;

    let result = unsafe { libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_RANDOM) };
    if result != 0 {
        let err = std::io::Error::from_raw_os_error(result);
        warn!("posix_fadvise(RANDOM) failed for {}: {}", path.display(), err);
    }
}

#[cfg(not(target_os = "linux"))]
fn advise_random(_file: &File, _path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Write `units` units where every byte of unit `i` equals `i as u8`
    fn write_units(dir: &TempDir, units: u64, unit_size: u64, extra: usize) -> PathBuf {
        let path = dir.path().join("units.bin");
        let mut data = Vec::new();
        for i in 0..units {
            data.extend(std::iter::repeat(i as u8).take(unit_size as usize));
        }
        data.extend(std::iter::repeat(0xEE).take(extra));
        std::fs::write(&path, &data).unwrap();
        path
    }

    #[test]
    fn test_reader_reads_unit_at_offset() {
        let dir = TempDir::new().unwrap();
        let path = write_units(&dir, 4, 4096, 0);

        let reader = ChunkReader::open(&path, 4096, TailPolicy::Truncate).unwrap();
        assert_eq!(reader.chunk_count(), 4);
        assert_eq!(reader.offset_of(3), 3 * 4096);

        for unit in 0..4 {
            let bytes = reader.read_unit(unit).unwrap();
            assert_eq!(bytes.len(), 4096);
            assert!(bytes.iter().all(|&b| b == unit as u8));
        }
    }

    #[test]
    fn test_reader_appends_in_call_order() {
        let dir = TempDir::new().unwrap();
        let path = write_units(&dir, 3, 16, 0);
        let reader = ChunkReader::open(&path, 16, TailPolicy::Truncate).unwrap();

        let mut buf = Vec::new();
        reader.read_unit_into(2, &mut buf).unwrap();
        reader.read_unit_into(0, &mut buf).unwrap();
        assert_eq!(buf.len(), 32);
        assert!(buf[..16].iter().all(|&b| b == 2));
        assert!(buf[16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_reader_truncates_tail() {
        let dir = TempDir::new().unwrap();
        let path = write_units(&dir, 2, 64, 10);

        let reader = ChunkReader::open(&path, 64, TailPolicy::Truncate).unwrap();
        assert_eq!(reader.chunk_count(), 2);
        let err = reader.read_unit(2).unwrap_err();
        assert!(matches!(err, ScanError::UnitOutOfBounds { unit: 2, chunk_count: 2 }));
    }

    #[test]
    fn test_reader_partial_tail_unit() {
        let dir = TempDir::new().unwrap();
        let path = write_units(&dir, 2, 64, 10);

        let reader = ChunkReader::open(&path, 64, TailPolicy::Partial).unwrap();
        assert_eq!(reader.chunk_count(), 3);
        let tail = reader.read_unit(2).unwrap();
        assert_eq!(tail, vec![0xEE; 10]);
    }

    #[test]
    fn test_reader_short_read_after_shrink() {
        let dir = TempDir::new().unwrap();
        let path = write_units(&dir, 4, 64, 0);
        let reader = ChunkReader::open(&path, 64, TailPolicy::Truncate).unwrap();

        // Shrink the file behind the reader's back
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(3 * 64 + 5).unwrap();

        let mut buf = vec![1, 2, 3];
        let err = reader.read_unit_into(3, &mut buf).unwrap_err();
        match err {
            ScanError::ShortRead { unit, expected, actual } => {
                assert_eq!(unit, 3);
                assert_eq!(expected, 64);
                assert_eq!(actual, 5);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(buf, vec![1, 2, 3]);
    }

    #[test]
    fn test_reader_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = ChunkReader::open(dir.path().join("nope.bin"), 4096, TailPolicy::Truncate).unwrap_err();
        assert!(matches!(err, ScanError::Io { .. }));
    }

    #[test]
    fn test_reader_clones_share_file() {
        let dir = TempDir::new().unwrap();
        let path = write_units(&dir, 8, 32, 0);
        let reader = ChunkReader::open(&path, 32, TailPolicy::Truncate).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let reader = reader.clone();
                std::thread::spawn(move || {
                    for unit in (t..8).step_by(4) {
                        let bytes = reader.read_unit(unit).unwrap();
                        assert!(bytes.iter().all(|&b| b == unit as u8));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
