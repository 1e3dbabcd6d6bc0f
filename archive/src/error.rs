//! The fatal-error taxonomy shared by the archive and asset layers.
//!
//! Every fatal parse condition maps to exactly one variant. Warnings never
//! surface here; they go through `tracing` and the parse continues.

use std::fmt;

/// Alias used throughout the parsing code.
pub type Result<T> = std::result::Result<T, Error>;

/// A fatal parse error, carrying the byte position where it was detected
/// whenever one exists.
#[derive(Debug)]
pub enum Error {
    /// Read past the end of a byte source.
    Eof {
        /// Cursor position at the failed read.
        pos: u64,
    },
    /// Magic / four-cc / main-package mismatch on a raw archive.
    InvalidHeader {
        #[allow(missing_docs)]
        reason: String,
    },
    /// The same identity checks, failed on a reconstructed midway image.
    InvalidMidwayHeader {
        #[allow(missing_docs)]
        reason: String,
    },
    /// Compression flag outside the Oodle family.
    UnsupportedCompression {
        /// The offending flag value.
        flag: u32,
    },
    /// Chunk totals disagree with the block header, or a decompressor
    /// returned the wrong number of bytes.
    CorruptBlock {
        /// Position of the block or chunk, where known.
        pos: u64,
        #[allow(missing_docs)]
        reason: String,
    },
    /// A midway-image splice landed on bytes that were already populated.
    OverlappingWrite {
        /// Destination offset of the splice.
        offset: u64,
        /// Length of the incoming data.
        len: usize,
    },
    /// An external-table entry is neither psf-shaped nor bulk-shaped.
    MalformedExternalEntry {
        /// Position just past the offending entry.
        pos: u64,
        /// `reference_key` of the enclosing table.
        key: u64,
        /// Row index within the table.
        index: usize,
    },
    /// Two external tables in one group share a `reference_key`.
    DuplicateTableKey {
        #[allow(missing_docs)]
        key: u64,
    },
    /// The PSF tables and the extra-package list cannot be zipped.
    PsfExtraMismatch {
        /// Index of the first pair that failed, counting flattened entries.
        index: usize,
        #[allow(missing_docs)]
        reason: String,
    },
    /// `property_size == 0` on a tag that is not `BoolProperty`.
    ZeroSizedProperty {
        /// Property name.
        name: String,
        /// Type tag.
        type_name: String,
    },
    /// A property value consumed a different number of bytes than its
    /// declared size.
    PropertySizeMismatch {
        /// Property name.
        name: String,
        #[allow(missing_docs)]
        expected: u64,
        #[allow(missing_docs)]
        actual: u64,
    },
    /// Key collision in a map that is not a multimap.
    DuplicateMapKey {
        /// Map property name.
        map: String,
        /// Rendered key.
        key: String,
    },
    /// A map property whose name is not in the closed classification table.
    UnsupportedMapKind {
        /// Map property name.
        map: String,
    },
    /// A type tag with no decoder.
    UnsupportedPropertyType {
        #[allow(missing_docs)]
        type_name: String,
    },
    /// A signed table index pointing outside the import/export tables.
    BadObjectReference {
        /// The raw signed index.
        index: i32,
        /// Import table length at the time of resolution.
        imports: usize,
        /// Export table length at the time of resolution.
        exports: usize,
    },
    /// A name-table index out of range.
    BadNameIndex {
        /// The raw index.
        index: u64,
        /// Name table length.
        len: usize,
    },
    /// A length-prefixed string that is not ASCII (or not valid UTF-16 for
    /// wide reads).
    InvalidString {
        /// Position of the string field.
        pos: u64,
    },
    /// An I/O failure from the underlying byte source.
    Io(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Eof { pos } => write!(f, "read past end of source at offset 0x{pos:X}"),
            Error::InvalidHeader { reason } => write!(f, "invalid archive header: {reason}"),
            Error::InvalidMidwayHeader { reason } => {
                write!(f, "invalid midway image header: {reason}")
            }
            Error::UnsupportedCompression { flag } => {
                write!(f, "compression flag 0x{flag:X} is not supported")
            }
            Error::CorruptBlock { pos, reason } => {
                write!(f, "corrupt block at offset 0x{pos:X}: {reason}")
            }
            Error::OverlappingWrite { offset, len } => write!(
                f,
                "data already exists at offset 0x{offset:X} (writing 0x{len:X} bytes)"
            ),
            Error::MalformedExternalEntry { pos, key, index } => write!(
                f,
                "external table {key:08X} entry {index} has an invalid offset signature (at 0x{pos:X})"
            ),
            Error::DuplicateTableKey { key } => {
                write!(f, "duplicate external table key {key:08X}")
            }
            Error::PsfExtraMismatch { index, reason } => write!(
                f,
                "psf tables and extra package list disagree at entry {index}: {reason}"
            ),
            Error::ZeroSizedProperty { name, type_name } => {
                write!(f, "property {name} of type {type_name} has size 0")
            }
            Error::PropertySizeMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "property {name} consumed 0x{actual:X} bytes, expected 0x{expected:X}"
            ),
            Error::DuplicateMapKey { map, key } => {
                write!(f, "map {map} already contains key {key}")
            }
            Error::UnsupportedMapKind { map } => write!(f, "unsupported map {map}"),
            Error::UnsupportedPropertyType { type_name } => {
                write!(f, "unsupported property type {type_name}")
            }
            Error::BadObjectReference {
                index,
                imports,
                exports,
            } => write!(
                f,
                "object reference {index} is outside the tables ({imports} imports, {exports} exports)"
            ),
            Error::BadNameIndex { index, len } => {
                write!(f, "name index {index} is outside the name table ({len} names)")
            }
            Error::InvalidString { pos } => {
                write!(f, "string at offset 0x{pos:X} is not valid text")
            }
            Error::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}
