//! Disk-backed append-only sequences of fixed-size records
//!
//! A sequence goes through three states:
//!
//! 1. [`SequenceWriter`]: append only, buffered writes to a file. Positions are
//!    monotonic and returned by [`SequenceWriter::push`].
//! 2. [`Sequence`]: after [`SequenceWriter::finish`] the file is memory-mapped
//!    read/write. Records can be read by position and updated in place, but not
//!    appended or moved.
//! 3. [`FrozenSequence`]: after [`Sequence::freeze`] the map is read-only and the
//!    sequence can be shared between threads.
//!
//! Records are little-endian, `T::SIZE` bytes each, with no header.

use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("index {index} out of bounds for sequence of length {len}")]
    OutOfBounds { index: u64, len: u64 },
}

/// A fixed-size little-endian record
pub trait Record: Sized {
    const SIZE: usize;

    fn encode(&self, buf: &mut [u8]);

    fn decode(buf: &[u8]) -> Self;
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> SequenceError + '_ {
    move |source| SequenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub struct SequenceWriter<T: Record> {
    path: PathBuf,
    writer: BufWriter<File>,
    len: u64,
    scratch: Vec<u8>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> SequenceWriter<T> {
    /// Create (or truncate) the backing file
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, SequenceError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(io_err(&path))?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            len: 0,
            scratch: vec![0u8; T::SIZE],
            _marker: PhantomData,
        })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a record and return its position
    pub fn push(&mut self, record: &T) -> Result<u64, SequenceError> {
        record.encode(&mut self.scratch);
        self.writer.write_all(&self.scratch).map_err(io_err(&self.path))?;
        let position = self.len;
        self.len += 1;
        Ok(position)
    }

    /// Flush and map the file for random access
    pub fn finish(self) -> Result<Sequence<T>, SequenceError> {
        let SequenceWriter { path, writer, len, .. } = self;
        let file = writer.into_inner().map_err(|e| SequenceError::Io {
            path: path.clone(),
            source: e.into_error(),
        })?;
        file.sync_data().map_err(io_err(&path))?;

        // Zero-length files cannot be mapped
        let mmap = if len == 0 {
            None
        } else {
            // SAFETY: the file is private to this sequence for its whole lifetime
            Some(unsafe { MmapOptions::new().map_mut(&file) }.map_err(io_err(&path))?)
        };

        Ok(Sequence {
            path,
            mmap,
            len,
            _marker: PhantomData,
        })
    }
}

pub struct Sequence<T: Record> {
    path: PathBuf,
    mmap: Option<MmapMut>,
    len: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> Sequence<T> {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn range(&self, index: u64) -> Result<std::ops::Range<usize>, SequenceError> {
        if index >= self.len {
            return Err(SequenceError::OutOfBounds {
                index,
                len: self.len,
            });
        }
        let start = index as usize * T::SIZE;
        Ok(start..start + T::SIZE)
    }

    pub fn get(&self, index: u64) -> Result<T, SequenceError> {
        let range = self.range(index)?;
        match &self.mmap {
            Some(mmap) => Ok(T::decode(&mmap[range])),
            None => unreachable!("non-empty sequences are always mapped"),
        }
    }

    /// Read-modify-write a record in place.
    ///
    /// This is the only mutation a sequence supports once appending is finished.
    pub fn update<F>(&mut self, index: u64, update: F) -> Result<(), SequenceError>
    where
        F: FnOnce(&mut T),
    {
        let range = self.range(index)?;
        if let Some(mmap) = &mut self.mmap {
            let mut record = T::decode(&mmap[range.clone()]);
            update(&mut record);
            record.encode(&mut mmap[range]);
        }
        Ok(())
    }

    /// Flush pending writes and make the map read-only
    pub fn freeze(self) -> Result<FrozenSequence<T>, SequenceError> {
        let Sequence { path, mmap, len, .. } = self;
        let mmap = match mmap {
            Some(mmap) => {
                mmap.flush().map_err(io_err(&path))?;
                Some(mmap.make_read_only().map_err(io_err(&path))?)
            }
            None => None,
        };
        Ok(FrozenSequence {
            path,
            mmap,
            len,
            _marker: PhantomData,
        })
    }
}

pub struct FrozenSequence<T: Record> {
    path: PathBuf,
    mmap: Option<Mmap>,
    len: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> FrozenSequence<T> {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, index: u64) -> Result<T, SequenceError> {
        if index >= self.len {
            return Err(SequenceError::OutOfBounds {
                index,
                len: self.len,
            });
        }
        let start = index as usize * T::SIZE;
        match &self.mmap {
            Some(mmap) => Ok(T::decode(&mmap[start..start + T::SIZE])),
            None => unreachable!("non-empty sequences are always mapped"),
        }
    }

    /// Records `start..start + count`
    pub fn slice(&self, start: u64, count: u64) -> Result<Vec<T>, SequenceError> {
        (start..start + count).map(|i| self.get(i)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        let bytes: &[u8] = self.mmap.as_deref().unwrap_or(&[]);
        bytes.chunks_exact(T::SIZE).map(T::decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Pair {
        a: u32,
        b: i64,
    }

    impl Record for Pair {
        const SIZE: usize = 12;

        fn encode(&self, buf: &mut [u8]) {
            buf[0..4].copy_from_slice(&self.a.to_le_bytes());
            buf[4..12].copy_from_slice(&self.b.to_le_bytes());
        }

        fn decode(buf: &[u8]) -> Self {
            Pair {
                a: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
                b: i64::from_le_bytes(buf[4..12].try_into().unwrap()),
            }
        }
    }

    #[test]
    fn push_returns_monotonic_positions() {
        let dir = TempDir::new().unwrap();
        let mut writer = SequenceWriter::<Pair>::create(dir.path().join("pairs.bin")).unwrap();
        for i in 0..10u32 {
            let pos = writer.push(&Pair { a: i, b: -(i as i64) }).unwrap();
            assert_eq!(pos, u64::from(i));
        }
        assert_eq!(writer.len(), 10);

        let seq = writer.finish().unwrap();
        assert_eq!(seq.get(7).unwrap(), Pair { a: 7, b: -7 });
        assert!(matches!(
            seq.get(10),
            Err(SequenceError::OutOfBounds { index: 10, len: 10 })
        ));
    }

    #[test]
    fn updates_survive_freezing() {
        let dir = TempDir::new().unwrap();
        let mut writer = SequenceWriter::<Pair>::create(dir.path().join("pairs.bin")).unwrap();
        for i in 0..4u32 {
            writer.push(&Pair { a: i, b: 0 }).unwrap();
        }
        let mut seq = writer.finish().unwrap();
        seq.update(2, |p| p.b = 99).unwrap();
        assert!(seq.update(4, |p| p.b = 1).is_err());

        let frozen = seq.freeze().unwrap();
        let all: Vec<Pair> = frozen.iter().collect();
        assert_eq!(all.len(), 4);
        assert_eq!(all[2], Pair { a: 2, b: 99 });
        assert_eq!(frozen.slice(1, 2).unwrap(), vec![Pair { a: 1, b: 0 }, Pair { a: 2, b: 99 }]);

        let on_disk = std::fs::read(frozen.path()).unwrap();
        assert_eq!(on_disk.len(), 4 * Pair::SIZE);
    }

    #[test]
    fn empty_sequences_are_usable() {
        let dir = TempDir::new().unwrap();
        let writer = SequenceWriter::<Pair>::create(dir.path().join("empty.bin")).unwrap();
        let frozen = writer.finish().unwrap().freeze().unwrap();
        assert!(frozen.is_empty());
        assert_eq!(frozen.iter().count(), 0);
        assert!(frozen.get(0).is_err());
        assert_eq!(frozen.slice(0, 0).unwrap(), Vec::<Pair>::new());
    }
}
