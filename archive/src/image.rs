//! The growable buffer the midway image is assembled into.

use crate::error::{Error, Result};
use tracing::{debug, warn};

/// A growable byte buffer with positional writes and an explicit
/// zero-filled-up-to-length invariant.
///
/// Sub-package blocks arrive keyed by destination offset and may be
/// out of order or leave holes; holes are zero-filled and rewriting
/// bytes that are already nonzero is fatal.
#[derive(Default)]
pub struct MidwayImage {
    buf: Vec<u8>,
}

impl MidwayImage {
    /// Starts an empty image.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current length in bytes.
    pub fn len(&self) -> u64 {
        self.buf.len() as u64
    }

    /// Returns `true` if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Appends bytes at the current end.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Appends `n` zero bytes.
    pub fn append_zeros(&mut self, n: usize) {
        self.buf.resize(self.buf.len() + n, 0);
    }

    /// Writes `data` at `offset` under the splice policy:
    ///
    /// * past the end: zero-fill the hole, then append (with a warning);
    /// * inside the buffer over all-zero bytes: overwrite (debug note only,
    ///   the input was probably unordered);
    /// * inside the buffer over any nonzero byte: fatal
    ///   [`Error::OverlappingWrite`];
    /// * exactly at the end: plain append.
    pub fn splice(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let len = self.buf.len() as u64;
        let end = offset + data.len() as u64;

        if offset > len {
            warn!(
                offset = format_args!("0x{offset:X}"),
                buffer = format_args!("0x{len:X}"),
                "offset beyond current buffer, padding with zeros"
            );
            self.append_zeros((offset - len) as usize);
        } else if offset < len {
            let occupied = &self.buf[offset as usize..end.min(len) as usize];
            if occupied.iter().any(|&b| b != 0) {
                return Err(Error::OverlappingWrite {
                    offset,
                    len: data.len(),
                });
            }
            debug!(
                offset = format_args!("0x{offset:X}"),
                "writing over zero-filled bytes, possibly unordered input"
            );
            let overlap = (end.min(len) - offset) as usize;
            self.buf[offset as usize..offset as usize + overlap]
                .copy_from_slice(&data[..overlap]);
            self.buf.extend_from_slice(&data[overlap..]);
            return Ok(());
        }

        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Borrows the assembled bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Takes the assembled buffer.
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}
