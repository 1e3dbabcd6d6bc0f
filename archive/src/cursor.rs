//! Byte-oriented readers: a seekable cursor over a [`ByteSource`] and a
//! slice parser for in-memory record decoding.

use crate::error::{Error, Result};
use crate::source::ByteSource;
use core::mem::size_of;
use std::mem::take;
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

/// A sequential little-endian reader over a [`ByteSource`].
///
/// Reads are bounds-checked against the source length and fail with
/// [`Error::Eof`] carrying the position of the failed read. The cursor is not
/// thread-safe; each parse uses one cursor per source.
pub struct Cursor<'a> {
    src: &'a ByteSource,
    pos: u64,
}

impl<'a> Cursor<'a> {
    /// Starts a cursor at offset 0.
    pub fn new(src: &'a ByteSource) -> Self {
        Self { src, pos: 0 }
    }

    /// Current absolute position.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Total length of the underlying source.
    pub fn len(&self) -> u64 {
        self.src.len()
    }

    /// Returns `true` if the cursor is at or past the end.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.src.len()
    }

    /// Moves to an absolute position. Seeking past the end is allowed; the
    /// next read will fail instead.
    pub fn seek(&mut self, pos: u64) {
        self.pos = pos;
    }

    /// Advances by `n` bytes.
    pub fn skip(&mut self, n: u64) {
        self.pos += n;
    }

    /// Reads exactly `n` bytes and advances.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let end = self
            .pos
            .checked_add(n as u64)
            .ok_or(Error::Eof { pos: self.pos })?;
        if end > self.src.len() {
            return Err(Error::Eof { pos: self.pos });
        }
        let buf = self.src.read_range(self.pos, n)?;
        self.pos = end;
        Ok(buf)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self
            .pos
            .checked_add(N as u64)
            .ok_or(Error::Eof { pos: self.pos })?;
        if end > self.src.len() {
            return Err(Error::Eof { pos: self.pos });
        }
        let mut buf = [0u8; N];
        self.src.read_exact_at(&mut buf, self.pos)?;
        self.pos = end;
        Ok(buf)
    }

    /// Reads one byte and advances.
    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    /// Reads one signed byte and advances.
    pub fn i8(&mut self) -> Result<i8> {
        Ok(self.array::<1>()?[0] as i8)
    }

    /// Reads a little-endian `u16` and advances.
    pub fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    /// Reads a little-endian `i16` and advances.
    pub fn i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    /// Reads a little-endian `u32` and advances.
    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// Reads a little-endian `u64` and advances.
    pub fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// Reads a little-endian `i32` and advances.
    pub fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    /// Reads a little-endian `i64` and advances.
    pub fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    /// Reads a fixed on-disk record.
    pub fn record<T: FromBytes + Unaligned + KnownLayout + Immutable>(&mut self) -> Result<T> {
        let bytes = self.read_bytes(size_of::<T>())?;
        // The length is exact and T is unaligned, so this cannot fail.
        Ok(T::read_from_bytes(&bytes).unwrap())
    }

    /// Reads `n` bytes as ASCII, truncating at the first NUL.
    ///
    /// Name fields in this format are length-prefixed and occasionally carry
    /// a terminator inside the counted length.
    pub fn ascii(&mut self, n: usize) -> Result<String> {
        let start = self.pos;
        let mut bytes = self.read_bytes(n)?;
        if let Some(nul) = bytes.iter().position(|&b| b == 0) {
            bytes.truncate(nul);
        }
        if !bytes.is_ascii() {
            return Err(Error::InvalidString { pos: start });
        }
        // ASCII was just verified.
        Ok(String::from_utf8(bytes).unwrap())
    }

    /// Reads `n_chars` UTF-16LE code units and advances.
    pub fn utf16le(&mut self, n_chars: usize) -> Result<String> {
        let start = self.pos;
        let bytes = self.read_bytes(n_chars * 2)?;
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16(&units).map_err(|_| Error::InvalidString { pos: start })
    }
}

/// A byte-oriented parser over an in-memory slice, used for decoding tagged
/// property streams and table records out of the reconstructed image.
#[derive(Clone)]
pub struct Parser<'a> {
    /// The bytes that have not yet been parsed.
    bytes: &'a [u8],
    /// Length of the original input; used to report absolute-ish positions.
    full_len: usize,
}

impl<'a> Parser<'a> {
    /// Starts a new parser.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            full_len: bytes.len(),
        }
    }

    /// Number of unparsed bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Indicates whether there are any bytes left to parse.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Offset within the original input.
    pub fn position(&self) -> u64 {
        (self.full_len - self.bytes.len()) as u64
    }

    /// Gets the rest of the unparsed bytes without advancing.
    pub fn peek_rest(&self) -> &'a [u8] {
        self.bytes
    }

    /// Takes the rest of the unparsed bytes.
    pub fn take_rest(&mut self) -> &'a [u8] {
        take(&mut self.bytes)
    }

    /// Takes the next `n` bytes and advances.
    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.bytes.len() < n {
            return Err(Error::Eof {
                pos: self.position(),
            });
        }
        let (lo, hi) = self.bytes.split_at(n);
        self.bytes = hi;
        Ok(lo)
    }

    /// Skips `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.bytes(n).map(|_| ())
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let s = self.bytes(N)?;
        // The slice is exactly N bytes long.
        Ok(<[u8; N]>::try_from(s).unwrap())
    }

    /// Reads one byte and advances.
    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    /// Reads a little-endian `u16` and advances.
    pub fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    /// Reads a little-endian `u32` and advances.
    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// Reads a little-endian `u64` and advances.
    pub fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// Reads a little-endian `f32` and advances.
    pub fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    /// Reads an unsigned little-endian integer of `width` bytes (1, 2, 4,
    /// or 8) and advances.
    pub fn uint(&mut self, width: usize) -> Result<u64> {
        if width == 0 || width > 8 {
            return Err(Error::Eof {
                pos: self.position(),
            });
        }
        let bytes = self.bytes(width)?;
        let mut buf = [0u8; 8];
        buf[..width].copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    /// Reads a signed little-endian integer of `width` bytes and advances.
    pub fn int(&mut self, width: usize) -> Result<i64> {
        let value = self.uint(width)?;
        let shift = 64 - width as u32 * 8;
        Ok(((value << shift) as i64) >> shift)
    }

    /// Reads a fixed on-disk record.
    pub fn record<T: FromBytes + Unaligned + KnownLayout + Immutable>(&mut self) -> Result<T> {
        let bytes = self.bytes(size_of::<T>())?;
        Ok(T::read_from_bytes(bytes).unwrap())
    }

    /// Reads `n` bytes as ASCII, truncating at the first NUL.
    pub fn ascii(&mut self, n: usize) -> Result<String> {
        let pos = self.position();
        let mut bytes = self.bytes(n)?;
        if let Some(nul) = bytes.iter().position(|&b| b == 0) {
            bytes = &bytes[..nul];
        }
        if !bytes.is_ascii() {
            return Err(Error::InvalidString { pos });
        }
        Ok(String::from_utf8(bytes.to_vec()).unwrap())
    }
}
