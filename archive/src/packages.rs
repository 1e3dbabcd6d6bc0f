//! The archive's two package lists (primary and extra) and their
//! sub-package entries.

use crate::cursor::Cursor;
use crate::error::Result;
use crate::{PackageTail, SubPackageRecord};
use tracing::trace;

/// One compressed region within a package.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SubPackage {
    /// Destination offset within the uncompressed image.
    pub decompressed_offset: u64,
    /// Size after decompression, excluding the block header.
    pub decompressed_size: u64,
    /// Offset of the block within the raw archive.
    pub compressed_offset: u64,
    #[allow(missing_docs)]
    pub compressed_size: u64,
}

impl From<SubPackageRecord> for SubPackage {
    fn from(r: SubPackageRecord) -> Self {
        Self {
            decompressed_offset: r.decompressed_offset.get(),
            decompressed_size: r.decompressed_size.get(),
            compressed_offset: r.compressed_offset.get(),
            compressed_size: r.compressed_size.get(),
        }
    }
}

/// A named group of sub-package entries in the archive header.
#[derive(Clone, Debug)]
pub struct Package {
    /// Package name, NUL-truncated ASCII.
    pub name: String,
    /// Whole-package extents, mirroring the sub-package field layout.
    pub decompressed_offset: u64,
    #[allow(missing_docs)]
    pub decompressed_size: u64,
    #[allow(missing_docs)]
    pub compressed_offset: u64,
    #[allow(missing_docs)]
    pub compressed_size: u64,
    /// The package's compressed regions, in file order.
    pub entries: Vec<SubPackage>,
}

/// Reads one count-prefixed package list.
pub fn read_package_list(c: &mut Cursor<'_>) -> Result<Vec<Package>> {
    let count = c.u32()?;
    let mut packages = Vec::with_capacity(count as usize);
    for _ in 0..count {
        packages.push(read_package(c)?);
    }
    Ok(packages)
}

fn read_package(c: &mut Cursor<'_>) -> Result<Package> {
    let name_len = c.u32()?;
    let name = c.ascii(name_len as usize)?;
    let tail: PackageTail = c.record()?;

    let entries_count = tail.entries_count.get();
    let mut entries = Vec::with_capacity(entries_count as usize);
    for _ in 0..entries_count {
        let record: SubPackageRecord = c.record()?;
        entries.push(SubPackage::from(record));
    }

    trace!(name = %name, entries = entries.len(), "read package");

    Ok(Package {
        name,
        decompressed_offset: tail.decompressed_offset.get(),
        decompressed_size: tail.decompressed_size.get(),
        compressed_offset: tail.compressed_offset.get(),
        compressed_size: tail.compressed_size.get(),
        entries,
    })
}
