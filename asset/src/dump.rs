//! Filesystem dumps: the reconstructed `.upk`, text listings of every
//! table, export bodies, and per-external-entry blobs.
//!
//! Layout under `<save_dir>/<file_name>/`:
//!
//! * `<file_name>.upk` — the image itself
//! * `nametable.txt`, `importtable.txt`, `exporttable.txt` — raw listings
//! * `importtable.parsed.txt`, `exporttable.parsed.txt` — resolved listings
//! * `psftable.txt`, `bulktable.txt` — external table listings
//! * `exports/<file_dir>/<file_name>` — export bodies
//! * `{psf,bulk}s/<package>/<key:08X>/<entry_index>` — external blobs

use crate::objects::{Export, Import, ObjectRef};
use crate::MidwayAsset;
use anyhow::{bail, Context};
use mk11_archive::blocks::read_block;
use mk11_archive::tables::{EntryLocation, TableKind};
use mk11_archive::{CompressionFlags, Cursor, Decompress};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn hex_signed(v: i64) -> String {
    if v < 0 {
        format!("-{:X}", v.unsigned_abs())
    } else {
        format!("{v:X}")
    }
}

fn ref_display(r: ObjectRef) -> String {
    match r {
        ObjectRef::None => "0".to_string(),
        ObjectRef::Export(i) => format!("{:X}", i + 1),
        ObjectRef::Import(i) => format!("-{:X}", i + 1),
    }
}

fn export_raw_line(e: &Export) -> String {
    format!(
        "package={} folder={} class={} super={} name={}: {}",
        hex_signed(e.record.object_main_package.get() as i64),
        hex_signed(e.record.object_outer_class.get() as i64),
        hex_signed(e.record.object_class.get() as i64),
        hex_signed(e.record.object_super.get() as i64),
        hex_signed(e.record.object_name.get() as i64),
        e.name
    )
}

fn export_parsed_line(e: &Export) -> String {
    let mut s = String::new();
    if !e.package.is_empty() {
        s.push_str(&format!("[{}] ", e.package));
    }
    s.push_str(&e.path);
    s.push_str(&e.file_name);
    if let Some(super_name) = &e.super_name {
        s.push_str(&format!(" : {super_name}"));
    }
    s
}

fn import_raw_line(i: &Import) -> String {
    format!(
        "folder={} outer={} unknown={} {}: {}",
        hex_signed(i.record.import_class_package.get() as i64),
        hex_signed(i.record.import_outer_class.get() as i64),
        hex_signed(i.record.object_name.get() as i64),
        hex_signed(i.record.import_name.get() as i64),
        i.name
    )
}

fn import_parsed_line(i: &Import) -> String {
    let mut s = String::new();
    s.push_str(&i.path);
    s.push_str(&i.name);
    if let Some(outer) = &i.outer_class_name {
        s.push_str(&format!(" : {outer}"));
    }
    if !i.unknown.is_none() {
        s.push_str(&format!(" -- {}", ref_display(i.unknown)));
    }
    s
}

fn write_listing<I: IntoIterator<Item = String>>(path: &Path, lines: I) -> anyhow::Result<()> {
    let mut out = String::new();
    for (i, line) in lines.into_iter().enumerate() {
        out.push_str(&format!("{i:X}:\t{line}\n"));
    }
    fs::write(path, out).with_context(|| format!("writing {}", path.display()))
}

impl MidwayAsset {
    fn out_dir(&self, save_dir: &Path) -> PathBuf {
        save_dir.join(&self.file_name)
    }

    /// Writes the reconstructed image as `<file_name>.upk`.
    pub fn write_upk(&self, save_dir: &Path) -> anyhow::Result<PathBuf> {
        let dir = self.out_dir(save_dir);
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        let path = dir.join(format!("{}.upk", self.file_name));
        fs::write(&path, self.bytes()).with_context(|| format!("writing {}", path.display()))?;
        debug!(path = %path.display(), "wrote upk");
        Ok(path)
    }

    /// Writes the name, import, and export table listings, raw and parsed.
    pub fn dump_tables(&self, save_dir: &Path) -> anyhow::Result<()> {
        let dir = self.out_dir(save_dir);
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        write_listing(
            &dir.join("nametable.txt"),
            self.names.iter().map(str::to_string),
        )?;
        write_listing(
            &dir.join("importtable.txt"),
            self.imports.iter().map(import_raw_line),
        )?;
        write_listing(
            &dir.join("importtable.parsed.txt"),
            self.imports.iter().map(import_parsed_line),
        )?;
        write_listing(
            &dir.join("exporttable.txt"),
            self.exports.iter().map(export_raw_line),
        )?;
        write_listing(
            &dir.join("exporttable.parsed.txt"),
            self.exports.iter().map(export_parsed_line),
        )?;
        Ok(())
    }

    /// Writes the PSF and bulk table listings.
    pub fn dump_external_tables(&self, save_dir: &Path) -> anyhow::Result<()> {
        for (tables, file) in [
            (&self.psf_tables, "psftable.txt"),
            (&self.bulk_tables, "bulktable.txt"),
        ] {
            if tables.is_empty() {
                continue;
            }
            let dir = self.out_dir(save_dir);
            fs::create_dir_all(&dir)?;
            let path = dir.join(file);

            let mut out = String::new();
            let mut counter = 0usize;
            for (i, table) in tables.iter().enumerate() {
                out.push_str(&format!(
                    "{i:04X} - {} - {:08X} ({}):\n",
                    table.name,
                    table.reference_key,
                    table.entries.len()
                ));
                for (j, entry) in table.entries.iter().enumerate() {
                    let location = match entry.location {
                        EntryLocation::Psf => "PSF",
                        EntryLocation::Bulk => "BULK",
                    };
                    out.push_str(&format!(
                        "\t{j:X}: [{counter:04X}] {:08X} {:08X} - {:08X} {:08X} | Compression: {} | {location}\n",
                        entry.compressed_offset,
                        entry.compressed_size,
                        entry.decompressed_offset,
                        entry.decompressed_size,
                        CompressionFlags::name(table.compression_flag),
                    ));
                    counter += 1;
                }
                out.push('\n');
            }
            fs::write(&path, out).with_context(|| format!("writing {}", path.display()))?;
        }
        Ok(())
    }

    /// Writes every export body under `exports/<file_dir>/<file_name>`.
    pub fn dump_exports(&self, save_dir: &Path, overwrite: bool) -> anyhow::Result<()> {
        let base = self.out_dir(save_dir).join("exports");
        for export in &self.exports {
            let dir = base.join(export.file_dir.trim_start_matches('/'));
            fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
            let path = dir.join(&export.file_name);
            if !overwrite && path.exists() {
                debug!(path = %path.display(), "exists, skipping");
                continue;
            }
            let data = self
                .export_data(export)
                .with_context(|| format!("reading export {}", export.full_name))?;
            debug!(export = %export.full_name, path = %path.display(), "saving export");
            fs::write(&path, data).with_context(|| format!("writing {}", path.display()))?;
        }
        Ok(())
    }

    /// Writes the data behind every external-table entry under
    /// `{psf,bulk}s/<package>/<reference_key:08X>/<entry_index>`.
    ///
    /// Entries in tables that declare compression are decompressed as blocks
    /// through `dec`; the rest are raw range reads. PSF entries read from the
    /// companion stream, bulk entries from the image.
    pub fn dump_external_entries(
        &self,
        kind: TableKind,
        save_dir: &Path,
        dec: Option<&dyn Decompress>,
        overwrite: bool,
    ) -> anyhow::Result<()> {
        let tables = match kind {
            TableKind::Psf => &self.psf_tables,
            TableKind::Bulk => &self.bulk_tables,
        };
        if tables.is_empty() {
            return Ok(());
        }

        let source = match kind {
            TableKind::Psf => match self.psf() {
                Some(psf) => psf,
                None => bail!("psf tables present but no companion psf stream to read from"),
            },
            TableKind::Bulk => &self.source,
        };

        let base = self
            .out_dir(save_dir)
            .join(format!("{}s", kind.as_str()));

        for table in tables {
            if table.entries.is_empty() {
                continue;
            }
            let dir = base
                .join(&table.name)
                .join(format!("{:08X}", table.reference_key));
            fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
            debug!(
                key = format_args!("{:08X}", table.reference_key),
                entries = table.entries.len(),
                dir = %dir.display(),
                "saving external entries"
            );

            for (j, entry) in table.entries.iter().enumerate() {
                let expected = match kind {
                    TableKind::Psf => EntryLocation::Psf,
                    TableKind::Bulk => EntryLocation::Bulk,
                };
                if entry.location != expected {
                    bail!(
                        "table {:08X} entry {j} location does not match its group",
                        table.reference_key
                    );
                }

                let path = dir.join(j.to_string());
                if !overwrite && path.exists() {
                    debug!(path = %path.display(), "exists, skipping");
                    continue;
                }

                let data = if table.compression_flag != 0 {
                    let dec = dec.with_context(|| {
                        format!(
                            "table {:08X} is compressed but no decompressor was supplied",
                            table.reference_key
                        )
                    })?;
                    let mut c = Cursor::new(source);
                    c.seek(entry.decompressed_offset);
                    read_block(&mut c, dec)?
                } else {
                    source.read_range(entry.decompressed_offset, entry.decompressed_size as usize)?
                };
                fs::write(&path, data).with_context(|| format!("writing {}", path.display()))?;
            }
        }
        Ok(())
    }

    /// Runs every dump: the `.upk`, all table listings, export bodies, and
    /// both external entry groups.
    pub fn dump_all(
        &self,
        save_dir: &Path,
        dec: Option<&dyn Decompress>,
        overwrite: bool,
    ) -> anyhow::Result<()> {
        info!(file_name = %self.file_name, dir = %save_dir.display(), "saving asset data");
        self.write_upk(save_dir)?;
        self.dump_tables(save_dir)?;
        self.dump_external_tables(save_dir)?;
        self.dump_exports(save_dir, overwrite)?;
        self.dump_external_entries(TableKind::Bulk, save_dir, dec, overwrite)?;
        if self.psf().is_some() {
            self.dump_external_entries(TableKind::Psf, save_dir, dec, overwrite)?;
        }
        Ok(())
    }
}
