//! Compression selection and the decompressor seam.

use crate::error::{Error, Result};
use bitflags::bitflags;

bitflags! {
    /// The summary's compression flag bit-set.
    ///
    /// Raw archives carry one of the platform flags; the rebuilt midway image
    /// always carries zero.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct CompressionFlags: u32 {
        #[allow(missing_docs)]
        const ZLIB = 0x0001;
        #[allow(missing_docs)]
        const LZO = 0x0002;
        #[allow(missing_docs)]
        const LZX = 0x0004;
        #[allow(missing_docs)]
        const PFS = 0x0008;
        #[allow(missing_docs)]
        const PS4 = 0x0010;
        #[allow(missing_docs)]
        const XBX = 0x0040;
        #[allow(missing_docs)]
        const OODLE = 0x0100;
    }
}

impl CompressionFlags {
    /// Short display name for table dumps.
    pub fn name(flag: u32) -> &'static str {
        match flag {
            0 => "NONE",
            0x0001 => "ZLIB",
            0x0002 => "LZO",
            0x0004 => "LZX",
            0x0008 => "PFS",
            0x0010 => "PS4",
            0x0040 => "XBX",
            0x0100 => "OODLE",
            _ => "MIXED",
        }
    }
}

/// Smallest flag value that selects the Oodle family (PS4 / XBX / OODLE).
pub const OODLE_FAMILY_MIN: u32 = 0x0010;

/// The codec selected by a compression flag.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Codec {
    /// Oodle, codec id 7 ("MK11") by default.
    Oodle,
}

impl Codec {
    /// Selects a codec for a nonzero flag. Values below the Oodle family
    /// (including zero) are unsupported on a raw archive.
    pub fn try_from_flag(flag: u32) -> Result<Self> {
        if flag >= OODLE_FAMILY_MIN {
            Ok(Self::Oodle)
        } else {
            Err(Error::UnsupportedCompression { flag })
        }
    }

    /// Like [`Codec::try_from_flag`], but zero means "not compressed".
    pub fn try_from_flag_opt(flag: u32) -> Result<Option<Self>> {
        if flag == 0 {
            Ok(None)
        } else {
            Ok(Some(Self::try_from_flag(flag)?))
        }
    }
}

/// The decompression primitive, supplied by the caller.
///
/// The implementation must return exactly `expected_len` bytes; the block
/// reader treats any other length as a corrupt block. The adapter is
/// stateless and may be shared across parses.
pub trait Decompress {
    /// Decompresses one chunk.
    fn decompress(&self, src: &[u8], expected_len: usize) -> Result<Vec<u8>>;
}
