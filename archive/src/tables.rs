//! External data tables: PSF (companion-file) and bulk (in-image) groups.
//!
//! Each group is a count-prefixed list of tables; each table carries a
//! content-addressed `reference_key`, a name, its entry rows, and a trailing
//! per-table compression flag. Every entry is classified by its offset
//! signature alone.

use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::packages::Package;
use crate::{ExternalEntryRecord, NEG_OFFSET};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Which group a table was declared under.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TableKind {
    /// Companion `.psf` stream.
    Psf,
    /// In-image tail region.
    Bulk,
}

impl TableKind {
    /// Lower-case name used in dump paths and log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            TableKind::Psf => "psf",
            TableKind::Bulk => "bulk",
        }
    }
}

/// Where an entry's data actually lives, derived from its offset signature.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntryLocation {
    /// `compressed_offset == decompressed_offset`: the companion PSF file.
    Psf,
    /// Both compressed fields are [`NEG_OFFSET`]: the midway image tail.
    Bulk,
}

/// One classified external-table row.
#[derive(Clone, Copy, Debug)]
pub struct ExternalEntry {
    #[allow(missing_docs)]
    pub decompressed_size: u64,
    #[allow(missing_docs)]
    pub compressed_size: u64,
    #[allow(missing_docs)]
    pub decompressed_offset: u64,
    #[allow(missing_docs)]
    pub compressed_offset: u64,
    /// Derived location tag.
    pub location: EntryLocation,
}

/// One external table.
#[derive(Clone, Debug)]
pub struct ExternalTable {
    /// Content-addressed key other assets use to reference this table.
    pub reference_key: u64,
    /// Package name, NUL-truncated ASCII.
    pub name: String,
    /// The recorded name length; re-serialization pads back to it.
    pub name_len: u32,
    #[allow(missing_docs)]
    pub entries: Vec<ExternalEntry>,
    /// Per-table compression flag for the referenced data.
    pub compression_flag: u32,
}

/// Reads one count-prefixed table group, classifying every entry.
pub fn read_table_group(c: &mut Cursor<'_>, kind: TableKind) -> Result<Vec<ExternalTable>> {
    let count = c.u32()?;
    let mut tables = Vec::with_capacity(count as usize);
    for _ in 0..count {
        tables.push(read_table(c, kind)?);
    }
    Ok(tables)
}

fn read_table(c: &mut Cursor<'_>, kind: TableKind) -> Result<ExternalTable> {
    let reference_key = c.u64()?;
    let name_len = c.u32()?;
    let name = c.ascii(name_len as usize)?;
    let entries_count = c.u32()?;

    let mut raw = Vec::with_capacity(entries_count as usize);
    for _ in 0..entries_count {
        let record: ExternalEntryRecord = c.record()?;
        raw.push((record, c.position()));
    }
    let compression_flag = c.u32()?;

    let mut entries = Vec::with_capacity(raw.len());
    for (index, (record, pos)) in raw.into_iter().enumerate() {
        let location = classify_entry(&record, kind, compression_flag, reference_key, index, pos)?;
        entries.push(ExternalEntry {
            decompressed_size: record.decompressed_size.get(),
            compressed_size: record.compressed_size.get(),
            decompressed_offset: record.decompressed_offset.get(),
            compressed_offset: record.compressed_offset.get(),
            location,
        });
    }

    debug!(
        key = format_args!("{reference_key:08X}"),
        name = %name,
        entries = entries.len(),
        kind = kind.as_str(),
        "read external table"
    );

    Ok(ExternalTable {
        reference_key,
        name,
        name_len,
        entries,
        compression_flag,
    })
}

fn classify_entry(
    record: &ExternalEntryRecord,
    kind: TableKind,
    compression_flag: u32,
    key: u64,
    index: usize,
    pos: u64,
) -> Result<EntryLocation> {
    let c_off = record.compressed_offset.get();
    let c_size = record.compressed_size.get();
    let d_off = record.decompressed_offset.get();

    // Equal offsets always mean psf; the check is ordered before the bulk
    // rule, so a fully-negated pair with matching offsets lands here too.
    if c_off == d_off {
        if kind == TableKind::Bulk {
            warn!(
                key = format_args!("{key:08X}"),
                index, "psf-shaped entry declared inside a bulk group"
            );
        }
        return Ok(EntryLocation::Psf);
    }

    if c_off == NEG_OFFSET && c_size == NEG_OFFSET {
        if compression_flag != 0 {
            warn!(
                key = format_args!("{key:08X}"),
                index,
                flag = format_args!("0x{compression_flag:X}"),
                "bulk entry has no compressed extent but the table requests compression"
            );
        }
        return Ok(EntryLocation::Bulk);
    }

    // One field negative and the other not, or a compressed extent disjoint
    // from the decompressed one. Neither shape is defined for this format.
    Err(Error::MalformedExternalEntry { pos, key, index })
}

/// Appends the group's on-disk form to `out`, preserving recorded name
/// lengths (names are NUL-padded back to their original width).
pub fn serialize_table_group(tables: &[ExternalTable], out: &mut Vec<u8>) {
    out.extend_from_slice(&(tables.len() as u32).to_le_bytes());
    for table in tables {
        out.extend_from_slice(&table.reference_key.to_le_bytes());
        out.extend_from_slice(&table.name_len.to_le_bytes());
        let mut name_bytes = table.name.as_bytes().to_vec();
        name_bytes.resize(table.name_len as usize, 0);
        out.extend_from_slice(&name_bytes);
        out.extend_from_slice(&(table.entries.len() as u32).to_le_bytes());
        for entry in &table.entries {
            out.extend_from_slice(&entry.decompressed_size.to_le_bytes());
            out.extend_from_slice(&entry.compressed_size.to_le_bytes());
            out.extend_from_slice(&entry.decompressed_offset.to_le_bytes());
            out.extend_from_slice(&entry.compressed_offset.to_le_bytes());
        }
        out.extend_from_slice(&table.compression_flag.to_le_bytes());
    }
}

/// Builds the `reference_key -> table index` map for one group.
pub fn key_map(tables: &[ExternalTable]) -> Result<BTreeMap<u64, usize>> {
    let mut map = BTreeMap::new();
    for (i, table) in tables.iter().enumerate() {
        if map.insert(table.reference_key, i).is_some() {
            return Err(Error::DuplicateTableKey {
                key: table.reference_key,
            });
        }
    }
    Ok(map)
}

/// Cross-checks the PSF tables against the extra-package list.
///
/// Flattened in group-then-row order, the two sides must pair 1:1 on
/// `compressed_offset`. `decompressed_offset` mismatches only warn; the
/// package-side offset is a cache hint for already-decompressed data.
pub fn validate_psf_extra(psf_tables: &[ExternalTable], extra: &[Package]) -> Result<()> {
    let mut psf_iter = psf_tables.iter().flat_map(|t| t.entries.iter());
    let mut pkg_iter = extra.iter().flat_map(|p| p.entries.iter());

    let mut index = 0usize;
    loop {
        match (psf_iter.next(), pkg_iter.next()) {
            (Some(psf), Some(pkg)) => {
                if psf.compressed_offset != pkg.compressed_offset {
                    return Err(Error::PsfExtraMismatch {
                        index,
                        reason: format!(
                            "compressed offsets differ: psf 0x{:X}, package 0x{:X}",
                            psf.compressed_offset, pkg.compressed_offset
                        ),
                    });
                }
                if psf.decompressed_offset != pkg.decompressed_offset {
                    warn!(
                        index,
                        psf = format_args!("0x{:X}", psf.decompressed_offset),
                        package = format_args!("0x{:X}", pkg.decompressed_offset),
                        "psf and extra-package decompressed offsets differ"
                    );
                }
            }
            (Some(_), None) => {
                return Err(Error::PsfExtraMismatch {
                    index,
                    reason: "psf tables have entries not matched in the extra package list".into(),
                });
            }
            (None, Some(_)) => {
                return Err(Error::PsfExtraMismatch {
                    index,
                    reason: "extra package list has entries not matched in the psf tables".into(),
                });
            }
            (None, None) => return Ok(()),
        }
        index += 1;
    }
}
