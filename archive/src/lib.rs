//! Reads the outer MK11 asset container.
//!
//! An archive (`.xxx`/`.upk`) wraps a UE3-style package inside a shell that
//! adds multi-level package tables, per-chunk Oodle compression, and external
//! data tables (companion "PSF" streams and inline "bulk" regions). This crate
//! parses the shell, decompresses the block-compressed regions, and rebuilds
//! the contiguous uncompressed "midway" image whose internal offsets match the
//! offsets recorded in the file's own tables.

#![deny(unsafe_code)]
#![forbid(unused_must_use)]
#![warn(missing_docs)]

pub mod blocks;
pub mod compress;
pub mod cursor;
pub mod error;
pub mod image;
pub mod oodle;
pub mod packages;
pub mod read;
pub mod source;
pub mod tables;


pub use compress::{CompressionFlags, Decompress};
pub use cursor::{Cursor, Parser};
pub use error::{Error, Result};
pub use image::MidwayImage;
pub use read::{Archive, ParsedArchive, PsfSource};
pub use source::ByteSource;

use core::mem::size_of;
use static_assertions::const_assert_eq;
use zerocopy::byteorder::{LE, U16, U32, U64};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Package magic shared by the outer summary and every block header.
pub const SUMMARY_MAGIC: u32 = 0x9E2A_83C1;

/// Four-cc identifying the Midway branch of the engine.
pub const MIDWAY_FOUR_CC: [u8; 4] = *b"MK11";

/// The only supported main-package tag.
pub const MAIN_PACKAGE: [u8; 4] = *b"MAIN";

/// Number of reserved bytes between the package lists and the file name.
pub const RESERVED_GAP: usize = 0x18;

/// Sentinel offset/size meaning "not stored in this file".
pub const NEG_OFFSET: u64 = u64::MAX;

/// Table location/extent descriptor embedded in the file summary.
#[repr(C)]
#[derive(Clone, Copy, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
pub struct TableMeta {
    /// Number of entries in the table.
    pub entries: U32<LE>,
    /// Absolute byte offset of the table within the (uncompressed) image.
    pub offset: U64<LE>,
}

const_assert_eq!(size_of::<TableMeta>(), 12);

/// On-disk GUID, little-endian fields.
#[repr(C)]
#[derive(Clone, Copy, Eq, PartialEq, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
pub struct GuidLe {
    #[allow(missing_docs)]
    pub data1: U32<LE>,
    #[allow(missing_docs)]
    pub data2: U16<LE>,
    #[allow(missing_docs)]
    pub data3: U16<LE>,
    #[allow(missing_docs)]
    pub data4: [u8; 8],
}

const_assert_eq!(size_of::<GuidLe>(), 16);

impl GuidLe {
    /// Converts the on-disk format to the in-memory format.
    pub fn get(&self) -> uuid::Uuid {
        uuid::Uuid::from_fields(
            self.data1.get(),
            self.data2.get(),
            self.data3.get(),
            &self.data4,
        )
    }

    /// Returns `true` if every field is zero.
    pub fn is_zero(&self) -> bool {
        self.data1.get() == 0 && self.data2.get() == 0 && self.data3.get() == 0 && self.data4 == [0; 8]
    }
}

impl std::fmt::Display for GuidLe {
    /// Canonical `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX` form, upper-case.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            self.data1.get(),
            self.data2.get(),
            self.data3.get(),
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        )
    }
}

impl std::fmt::Debug for GuidLe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

/// The file summary stored at offset 0 of both the raw archive and the
/// rebuilt midway image.
///
/// The record is byte-packed; `compression_flag` is the last field and is the
/// only one rewritten (to zero) when the midway image is built.
#[repr(C)]
#[derive(Clone, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
pub struct FileSummary {
    /// Must equal [`SUMMARY_MAGIC`].
    pub magic: U32<LE>,
    #[allow(missing_docs)]
    pub file_version: U16<LE>,
    #[allow(missing_docs)]
    pub licensee_version: U16<LE>,
    /// Start of the export bodies within the uncompressed image.
    pub exports_location: U32<LE>,
    #[allow(missing_docs)]
    pub shader_version: U32<LE>,
    #[allow(missing_docs)]
    pub engine_version: U32<LE>,
    /// Must equal [`MIDWAY_FOUR_CC`].
    pub midway_four_cc: [u8; 4],
    #[allow(missing_docs)]
    pub midway_engine_version: U32<LE>,
    #[allow(missing_docs)]
    pub cook_version: U32<LE>,
    /// Must equal [`MAIN_PACKAGE`].
    pub main_package: [u8; 4],
    #[allow(missing_docs)]
    pub package_flags: U32<LE>,
    #[allow(missing_docs)]
    pub name_table: TableMeta,
    #[allow(missing_docs)]
    pub export_table: TableMeta,
    #[allow(missing_docs)]
    pub import_table: TableMeta,
    /// Start of the bulk region, or 0 when the image has no bulk tail.
    pub bulk_data_offset: U64<LE>,
    #[allow(missing_docs)]
    pub guid: GuidLe,
    /// Compression flag bit-set; see [`CompressionFlags`].
    pub compression_flag: U32<LE>,
}

/// Size in bytes of [`FileSummary`].
pub const SUMMARY_LEN: usize = 104;

const_assert_eq!(size_of::<FileSummary>(), SUMMARY_LEN);

impl FileSummary {
    /// Checks the fixed identification fields shared by raw archives and
    /// rebuilt images. Returns the first failure as a human-readable reason.
    pub fn check_identity(&self) -> std::result::Result<(), String> {
        if self.magic.get() != SUMMARY_MAGIC {
            return Err(format!("bad magic 0x{:08X}", self.magic.get()));
        }
        if self.midway_four_cc != MIDWAY_FOUR_CC {
            return Err(format!(
                "bad midway four-cc {:?}",
                bstr::BStr::new(&self.midway_four_cc)
            ));
        }
        if self.main_package != MAIN_PACKAGE {
            return Err(format!(
                "unsupported package type {:?}",
                bstr::BStr::new(&self.main_package)
            ));
        }
        Ok(())
    }
}

/// Header prefixed to every compressed region.
#[repr(C)]
#[derive(Clone, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
pub struct BlockHeader {
    /// Mirrors [`SUMMARY_MAGIC`].
    pub magic: U32<LE>,
    #[allow(missing_docs)]
    pub padding: U32<LE>,
    /// Maximum decompressed size of a single chunk.
    pub chunk_size: U64<LE>,
    /// Total compressed payload size of the block's chunks.
    pub compressed_size: U64<LE>,
    /// Total decompressed size of the block.
    pub decompressed_size: U64<LE>,
}

const_assert_eq!(size_of::<BlockHeader>(), 32);

/// One chunk inside a block. Chunk headers are enumerated until their summed
/// compressed sizes reach the block's `compressed_size`.
#[repr(C)]
#[derive(Clone, Copy, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
pub struct ChunkHeader {
    #[allow(missing_docs)]
    pub compressed_size: U64<LE>,
    #[allow(missing_docs)]
    pub decompressed_size: U64<LE>,
}

const_assert_eq!(size_of::<ChunkHeader>(), 16);

/// Fixed tail of a package descriptor, following the length-prefixed name.
#[repr(C)]
#[derive(Clone, Copy, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
pub struct PackageTail {
    #[allow(missing_docs)]
    pub decompressed_offset: U64<LE>,
    #[allow(missing_docs)]
    pub decompressed_size: U64<LE>,
    #[allow(missing_docs)]
    pub compressed_offset: U64<LE>,
    #[allow(missing_docs)]
    pub compressed_size: U64<LE>,
    /// Number of sub-package records that follow.
    pub entries_count: U32<LE>,
}

const_assert_eq!(size_of::<PackageTail>(), 36);

/// One sub-package record: a single compressed region.
#[repr(C)]
#[derive(Clone, Copy, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
pub struct SubPackageRecord {
    #[allow(missing_docs)]
    pub decompressed_offset: U64<LE>,
    /// Size of the region after decompression, excluding the block header.
    pub decompressed_size: U64<LE>,
    #[allow(missing_docs)]
    pub compressed_offset: U64<LE>,
    #[allow(missing_docs)]
    pub compressed_size: U64<LE>,
}

const_assert_eq!(size_of::<SubPackageRecord>(), 32);

/// One row of an external (PSF or bulk) table. Note the size-before-offset
/// field order; it differs from [`SubPackageRecord`].
#[repr(C)]
#[derive(Clone, Copy, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
pub struct ExternalEntryRecord {
    #[allow(missing_docs)]
    pub decompressed_size: U64<LE>,
    #[allow(missing_docs)]
    pub compressed_size: U64<LE>,
    #[allow(missing_docs)]
    pub decompressed_offset: U64<LE>,
    #[allow(missing_docs)]
    pub compressed_offset: U64<LE>,
}

const_assert_eq!(size_of::<ExternalEntryRecord>(), 32);
