//! Parses reconstructed MK11 midway assets.
//!
//! A midway asset is the uncompressed image produced by
//! [`mk11_archive::Archive::build_midway`]: a UE3-style package whose
//! summary, name/import/export tables, and external (PSF/bulk) tables all
//! address bytes inside the image itself or the companion PSF stream. This
//! crate re-parses that image, resolves object references into qualified
//! paths, validates coverage, and extracts export bodies.

#![forbid(unsafe_code)]
#![forbid(unused_must_use)]
#![warn(missing_docs)]

pub mod coverage;
pub mod dump;
pub mod enums;
pub mod extract;
pub mod names;
pub mod objects;
pub mod properties;

#[cfg(test)]
mod tests;

pub use coverage::{Diag, Diags};
pub use extract::{extract_all, ExtractJob};
pub use mk11_archive::{Archive, ByteSource, Decompress, Error, PsfSource, Result};
pub use names::NameTable;
pub use objects::{Export, Import, ObjectRef};
pub use properties::{MapKey, PropertyReader, PropertyValue};

use mk11_archive::tables::{key_map, read_table_group, ExternalTable, TableKind};
use mk11_archive::{CompressionFlags, Cursor, FileSummary, RESERVED_GAP};
use objects::{resolve_tables, ExportRecord, ImportRecord};
use std::collections::BTreeMap;
use tracing::{debug, info_span, warn};

/// A parsed midway asset.
///
/// Owns the reconstructed image; the parsed tables are resolved copies, and
/// export bodies are borrowed slices of the image.
pub struct MidwayAsset {
    source: ByteSource,
    psf: Option<ByteSource>,
    /// The image's summary, with a zero compression flag.
    pub summary: FileSummary,
    /// Asset file name, without extension.
    pub file_name: String,
    #[allow(missing_docs)]
    pub psf_tables: Vec<ExternalTable>,
    #[allow(missing_docs)]
    pub bulk_tables: Vec<ExternalTable>,
    /// `reference_key` to PSF table index.
    pub psf_map: BTreeMap<u64, usize>,
    /// `reference_key` to bulk table index.
    pub bulk_map: BTreeMap<u64, usize>,
    /// Bytes consumed by the summary, file name, and table groups.
    pub meta_size: u64,
    /// The interned name pool.
    pub names: NameTable,
    /// Resolved exports, in table order.
    pub exports: Vec<Export>,
    /// Resolved imports, in table order.
    pub imports: Vec<Import>,
    /// Coverage findings collected during the parse.
    pub diags: Diags,
}

impl MidwayAsset {
    /// Parses a reconstructed image, optionally with its companion PSF
    /// stream.
    pub fn parse(image: Vec<u8>, psf: Option<ByteSource>) -> Result<Self> {
        let _span = info_span!("MidwayAsset::parse").entered();

        let source = ByteSource::from_vec(image);
        let mut c = Cursor::new(&source);

        let summary: FileSummary = c.record()?;
        summary
            .check_identity()
            .map_err(|reason| Error::InvalidMidwayHeader { reason })?;
        if summary.compression_flag.get() != 0 {
            return Err(Error::InvalidMidwayHeader {
                reason: format!(
                    "compression flag was not reset to NONE (0x{:X})",
                    summary.compression_flag.get()
                ),
            });
        }

        let packages_count = c.u32()?;
        let packages_extra_count = c.u32()?;
        if packages_count != 0 || packages_extra_count != 0 {
            return Err(Error::InvalidMidwayHeader {
                reason: format!(
                    "expected empty package lists, found {packages_count} and {packages_extra_count}"
                ),
            });
        }
        c.skip(RESERVED_GAP as u64);

        let name_len = c.u32()?;
        let file_name = c.ascii(name_len as usize)?;

        let psf_tables = read_table_group(&mut c, TableKind::Psf)?;
        let bulk_tables = read_table_group(&mut c, TableKind::Bulk)?;
        let psf_map = key_map(&psf_tables)?;
        let bulk_map = key_map(&bulk_tables)?;

        let meta_size = c.position();
        if meta_size != summary.name_table.offset.get() {
            return Err(Error::InvalidMidwayHeader {
                reason: format!(
                    "meta size 0x{meta_size:X} does not match the declared name table offset 0x{:X}",
                    summary.name_table.offset.get()
                ),
            });
        }

        let names = NameTable::read(&mut c, &summary.name_table)?;

        c.seek(summary.export_table.offset.get());
        let mut export_records: Vec<ExportRecord> =
            Vec::with_capacity(summary.export_table.entries.get() as usize);
        for _ in 0..summary.export_table.entries.get() {
            export_records.push(c.record()?);
        }

        c.seek(summary.import_table.offset.get());
        let mut import_records: Vec<ImportRecord> =
            Vec::with_capacity(summary.import_table.entries.get() as usize);
        for _ in 0..summary.import_table.entries.get() {
            import_records.push(c.record()?);
        }

        let (exports, imports) = resolve_tables(&names, &export_records, &import_records)?;

        debug!(
            file_name = %file_name,
            names = names.len(),
            exports = exports.len(),
            imports = imports.len(),
            psf_tables = psf_tables.len(),
            bulk_tables = bulk_tables.len(),
            "parsed midway asset"
        );

        let mut asset = Self {
            source,
            psf,
            summary,
            file_name,
            psf_tables,
            bulk_tables,
            psf_map,
            bulk_map,
            meta_size,
            names,
            exports,
            imports,
            diags: Diags::new(),
        };
        asset.diags = asset.validate();
        if asset.diags.num_errors != 0 {
            warn!(
                issues = asset.diags.num_errors,
                "coverage issues detected, proceed with caution"
            );
        }
        Ok(asset)
    }

    /// The whole reconstructed image.
    pub fn bytes(&self) -> &[u8] {
        // The source is always the in-memory variant; see `parse`.
        self.source.as_slice().unwrap()
    }

    /// The companion PSF stream, when one was supplied.
    pub fn psf(&self) -> Option<&ByteSource> {
        self.psf.as_ref()
    }

    /// An export's body slice.
    pub fn export_data(&self, export: &Export) -> Result<&[u8]> {
        let offset = export.record.object_offset.get();
        let size = export.record.object_size.get() as u64;
        let end = offset
            .checked_add(size)
            .and_then(|end| usize::try_from(end).ok())
            .ok_or(Error::Eof { pos: offset })?;
        self.bytes()
            .get(offset as usize..end)
            .ok_or(Error::Eof { pos: offset })
    }

    /// Runs the export, bulk, and PSF coverage validators.
    pub fn validate(&self) -> Diags {
        let mut diags = Diags::new();

        let end = match self.summary.bulk_data_offset.get() {
            0 => self.source.len(),
            bulk => bulk,
        };
        coverage::validate_exports(
            &self.exports,
            self.summary.exports_location.get() as u64,
            end,
            &self.bulk_tables,
            &mut diags,
        );

        if !self.bulk_tables.is_empty() {
            coverage::validate_external("bulk", &self.bulk_tables, self.source.len(), &mut diags);
        }
        if !self.psf_tables.is_empty() {
            match &self.psf {
                Some(psf) => {
                    coverage::validate_external("psf", &self.psf_tables, psf.len(), &mut diags)
                }
                None => diags.warning("psf tables present but no companion psf stream supplied"),
            }
        }

        diags
    }
}

impl std::fmt::Display for MidwayAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Midway Asset File: {}", self.file_name)?;
        writeln!(
            f,
            "Compression Mode: {}",
            CompressionFlags::name(self.summary.compression_flag.get())
        )?;
        writeln!(f, "{} Names", self.names.len())?;
        writeln!(f, "{} Imports", self.imports.len())?;
        write!(f, "{} Exports", self.exports.len())
    }
}
