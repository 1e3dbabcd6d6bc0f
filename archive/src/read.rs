//! Whole-archive parsing and midway-image materialization.

use crate::blocks::read_block;
use crate::compress::{Codec, Decompress};
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::image::MidwayImage;
use crate::packages::{read_package_list, Package, SubPackage};
use crate::source::ByteSource;
use crate::tables::{
    read_table_group, serialize_table_group, validate_psf_extra, ExternalTable, TableKind,
};
use crate::{FileSummary, RESERVED_GAP};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info_span};
use zerocopy::IntoBytes;

/// Where to find the companion PSF stream for an archive.
///
/// A directory resolves to `<dir>/<file_name>.psf` once the archive's file
/// name is known; a file path is used directly; owned bytes are for tests
/// and callers that already loaded the stream.
pub enum PsfSource {
    /// A directory or direct file path.
    Path(PathBuf),
    /// A pre-loaded stream.
    Bytes(Vec<u8>),
}

/// An open archive plus its optional companion PSF source.
///
/// Opening borrows nothing: the source owns its file handle or buffer. The
/// archive is parsed once; the parse result and the materialized midway
/// image are independent of each other.
pub struct Archive {
    source: ByteSource,
    psf_source: Option<PsfSource>,
}

/// Everything the outer shell describes: the summary, both package lists,
/// the file name, and both external table groups.
pub struct ParsedArchive {
    #[allow(missing_docs)]
    pub summary: FileSummary,
    /// The raw archive's compression flag (always in the Oodle family).
    pub compression_flag: u32,
    /// The primary package list; its entries drive midway materialization.
    pub packages: Vec<Package>,
    /// The extra package list; pairs 1:1 with the PSF table entries.
    pub packages_extra: Vec<Package>,
    /// Archive file name, without extension.
    pub file_name: String,
    #[allow(missing_docs)]
    pub psf_tables: Vec<ExternalTable>,
    #[allow(missing_docs)]
    pub bulk_tables: Vec<ExternalTable>,
    /// Total size of the summary, package lists, file name, and table
    /// groups. Must equal the image's name-table offset after rebuild.
    pub meta_size: u64,
}

impl Archive {
    /// Opens an archive file read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self {
            source: ByteSource::open(path)?,
            psf_source: None,
        })
    }

    /// Wraps an in-memory archive.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            source: ByteSource::from_vec(bytes),
            psf_source: None,
        }
    }

    /// Attaches a companion PSF source.
    pub fn with_psf(mut self, psf: PsfSource) -> Self {
        self.psf_source = Some(psf);
        self
    }

    /// Borrows the underlying byte source.
    pub fn source(&self) -> &ByteSource {
        &self.source
    }

    /// Parses the outer shell: summary, package lists, file name, PSF and
    /// bulk table groups, and the PSF/extra pairing check. No decompression
    /// happens here.
    pub fn parse(&self) -> Result<ParsedArchive> {
        let _span = info_span!("Archive::parse").entered();

        let mut c = Cursor::new(&self.source);
        let summary: FileSummary = c.record()?;
        summary
            .check_identity()
            .map_err(|reason| Error::InvalidHeader { reason })?;

        let compression_flag = summary.compression_flag.get();
        // A raw archive must carry a compressed-family flag; zero is only
        // legal on the rebuilt image.
        Codec::try_from_flag(compression_flag)?;

        let packages = read_package_list(&mut c)?;
        let packages_extra = read_package_list(&mut c)?;
        c.skip(RESERVED_GAP as u64);

        let name_len = c.u32()?;
        let file_name = c.ascii(name_len as usize)?;

        let psf_tables = read_table_group(&mut c, TableKind::Psf)?;
        let bulk_tables = read_table_group(&mut c, TableKind::Bulk)?;
        let meta_size = c.position();

        debug!(
            file_name = %file_name,
            packages = packages.len(),
            packages_extra = packages_extra.len(),
            psf_tables = psf_tables.len(),
            bulk_tables = bulk_tables.len(),
            meta_size,
            "parsed archive shell"
        );

        validate_psf_extra(&psf_tables, &packages_extra)?;

        Ok(ParsedArchive {
            summary,
            compression_flag,
            packages,
            packages_extra,
            file_name,
            psf_tables,
            bulk_tables,
            meta_size,
        })
    }

    /// Decompresses one sub-package region.
    pub fn read_sub_package(&self, entry: &SubPackage, dec: &dyn Decompress) -> Result<Vec<u8>> {
        let mut c = Cursor::new(&self.source);
        c.seek(entry.compressed_offset);
        read_block(&mut c, dec)
    }

    /// Materializes the uncompressed midway image.
    ///
    /// The image starts with the summary re-serialized with a zero
    /// compression flag and two empty package counts, the reserved padding,
    /// the file-name section (length includes one NUL terminator), and both
    /// table groups. Every primary sub-package block is then decompressed
    /// and spliced in at its recorded `decompressed_offset`.
    pub fn build_midway(&self, parsed: &ParsedArchive, dec: &dyn Decompress) -> Result<Vec<u8>> {
        let _span = info_span!("Archive::build_midway").entered();

        let mut image = MidwayImage::new();

        let mut summary = parsed.summary.clone();
        summary.compression_flag.set(0);
        image.append(summary.as_bytes());
        // Two zero package counts.
        image.append_zeros(8);
        image.append_zeros(RESERVED_GAP);

        let name = parsed.file_name.as_bytes();
        image.append(&(name.len() as u32 + 1).to_le_bytes());
        image.append(name);
        image.append(&[0]);

        let mut tables = Vec::new();
        serialize_table_group(&parsed.psf_tables, &mut tables);
        serialize_table_group(&parsed.bulk_tables, &mut tables);
        image.append(&tables);

        let mut c = Cursor::new(&self.source);
        for package in &parsed.packages {
            debug!(package = %package.name, "deserializing package");
            for entry in &package.entries {
                c.seek(entry.compressed_offset);
                let data = read_block(&mut c, dec)?;
                image.splice(entry.decompressed_offset, &data)?;
            }
        }

        Ok(image.into_vec())
    }

    /// Dumps every decompressed sub-package region under
    /// `<save_dir>/<file_name>/packages[_extra]/<package_name>/file_<i>.bin`.
    pub fn dump_package_blobs(
        &self,
        parsed: &ParsedArchive,
        dec: &dyn Decompress,
        save_dir: &Path,
        overwrite: bool,
    ) -> Result<()> {
        for (list, sub_dir) in [
            (&parsed.packages, "packages"),
            (&parsed.packages_extra, "packages_extra"),
        ] {
            for package in list.iter() {
                if package.entries.is_empty() {
                    continue;
                }
                let dir = save_dir
                    .join(&parsed.file_name)
                    .join(sub_dir)
                    .join(&package.name);
                std::fs::create_dir_all(&dir)?;

                let mut c = Cursor::new(&self.source);
                for (i, entry) in package.entries.iter().enumerate() {
                    let out = dir.join(format!("file_{i}.bin"));
                    if !overwrite && out.exists() {
                        debug!(path = %out.display(), "exists, skipping");
                        continue;
                    }
                    c.seek(entry.compressed_offset);
                    let data = read_block(&mut c, dec)?;
                    std::fs::write(&out, &data)?;
                }
            }
        }
        Ok(())
    }

    /// Opens the companion PSF stream, resolving a directory source to
    /// `<dir>/<file_name>.psf`. Consumes the stored source; returns `None`
    /// when the archive has none.
    pub fn open_psf(&mut self, file_name: &str) -> io::Result<Option<ByteSource>> {
        match self.psf_source.take() {
            None => Ok(None),
            Some(PsfSource::Bytes(bytes)) => Ok(Some(ByteSource::from_vec(bytes))),
            Some(PsfSource::Path(path)) => {
                let path = if path.is_dir() {
                    path.join(format!("{file_name}.psf"))
                } else {
                    path
                };
                ByteSource::open(path).map(Some)
            }
        }
    }
}
