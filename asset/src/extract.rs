//! Batch extraction: archives in, dump trees out.

use crate::MidwayAsset;
use anyhow::Context;
use mk11_archive::{Archive, Decompress, PsfSource};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One archive to extract, optionally with a companion PSF source (a
/// directory holding `<file_name>.psf`, or the file itself).
pub struct ExtractJob {
    /// Path to the `.xxx`/`.upk` archive.
    pub path: PathBuf,
    /// PSF directory or file, when the archive has external PSF data.
    pub psf: Option<PathBuf>,
}

impl ExtractJob {
    /// A job with no PSF companion.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            psf: None,
        }
    }

    /// A job with a PSF companion source.
    pub fn with_psf<P: Into<PathBuf>, Q: Into<PathBuf>>(path: P, psf: Q) -> Self {
        Self {
            path: path.into(),
            psf: Some(psf.into()),
        }
    }
}

/// Parses each archive, rebuilds its midway image, and dumps everything
/// under `<output_dir>/<file_name>/`. Existing files are kept unless
/// `overwrite` is set. Returns each parsed asset together with its dump
/// directory, so callers can drive per-class handlers over the exports.
pub fn extract_all(
    jobs: &[ExtractJob],
    output_dir: &Path,
    overwrite: bool,
    dec: &dyn Decompress,
) -> anyhow::Result<Vec<(MidwayAsset, PathBuf)>> {
    let mut extracted = Vec::with_capacity(jobs.len());

    for job in jobs {
        info!(path = %job.path.display(), "parsing archive");

        let mut archive = Archive::open(&job.path)
            .with_context(|| format!("opening {}", job.path.display()))?;
        if let Some(psf) = &job.psf {
            archive = archive.with_psf(PsfSource::Path(psf.clone()));
        }

        let parsed = archive
            .parse()
            .with_context(|| format!("parsing {}", job.path.display()))?;
        archive
            .dump_package_blobs(&parsed, dec, output_dir, overwrite)
            .with_context(|| format!("dumping packages of {}", parsed.file_name))?;

        let image = archive
            .build_midway(&parsed, dec)
            .with_context(|| format!("rebuilding {}", parsed.file_name))?;
        let psf = archive
            .open_psf(&parsed.file_name)
            .with_context(|| format!("opening psf for {}", parsed.file_name))?;

        let asset = MidwayAsset::parse(image, psf)
            .with_context(|| format!("parsing midway image of {}", parsed.file_name))?;
        if asset.diags.has_errors() {
            warn!(
                file_name = %asset.file_name,
                issues = asset.diags.num_errors,
                "coverage issues detected"
            );
        }

        asset.dump_all(output_dir, Some(dec), overwrite)?;

        let dir = output_dir.join(&asset.file_name);
        extracted.push((asset, dir));
    }

    Ok(extracted)
}
