//! Byte sources: file-backed or in-memory, read-only, random-access.

use std::fs::File;
use std::io;
use std::path::Path;
use sync_file::{RandomAccessFile, ReadAt};

/// A read-only byte region with a known length.
///
/// The file-backed variant owns the file handle for the source's lifetime.
/// The in-memory variant owns its buffer; tests drive this variant
/// exclusively.
pub struct ByteSource {
    repr: Repr,
}

enum Repr {
    File { file: RandomAccessFile, size: u64 },
    Memory(Vec<u8>),
}

impl ByteSource {
    /// Opens a file read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            repr: Repr::File {
                file: RandomAccessFile::from(file),
                size,
            },
        })
    }

    /// Wraps an owned buffer.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            repr: Repr::Memory(bytes),
        }
    }

    /// Total length in bytes.
    pub fn len(&self) -> u64 {
        match &self.repr {
            Repr::File { size, .. } => *size,
            Repr::Memory(b) => b.len() as u64,
        }
    }

    /// Returns `true` if the source is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads exactly `buf.len()` bytes at `offset`.
    pub fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        match &self.repr {
            Repr::File { file, .. } => file.read_exact_at(buf, offset),
            Repr::Memory(b) => {
                let start = usize::try_from(offset)
                    .map_err(|_| io::Error::from(io::ErrorKind::UnexpectedEof))?;
                let src = b
                    .get(start..start + buf.len())
                    .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
                buf.copy_from_slice(src);
                Ok(())
            }
        }
    }

    /// Reads `len` bytes at `offset` into a fresh vector.
    pub fn read_range(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact_at(&mut buf, offset)?;
        Ok(buf)
    }

    /// Borrows the whole region, if it is in memory.
    pub fn as_slice(&self) -> Option<&[u8]> {
        match &self.repr {
            Repr::Memory(b) => Some(b),
            Repr::File { .. } => None,
        }
    }
}

impl std::fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.repr {
            Repr::File { size, .. } => write!(f, "ByteSource::File({size} bytes)"),
            Repr::Memory(b) => write!(f, "ByteSource::Memory({} bytes)", b.len()),
        }
    }
}
