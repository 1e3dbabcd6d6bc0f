//! Coverage validation: every byte of the export, bulk, and PSF regions is
//! accounted for, with overlaps, gaps, and extent violations reported.
//!
//! Findings are collected, not thrown; the caller decides what is fatal.

use crate::objects::Export;
use mk11_archive::tables::ExternalTable;
use tracing::trace;

/// One validation finding.
pub struct Diag {
    /// Human-readable description.
    pub message: String,
    /// `false` for advisory findings.
    pub is_error: bool,
}

/// A list of validation findings.
#[derive(Default)]
pub struct Diags {
    /// Number of error findings.
    pub num_errors: u32,
    /// Number of warning findings.
    pub num_warnings: u32,
    /// The findings, in detection order.
    pub diags: Vec<Diag>,
}

impl Diags {
    /// Starts an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error finding.
    pub fn error<S: Into<String>>(&mut self, msg: S) {
        let message = msg.into();
        trace!("error : {message}");
        self.num_errors += 1;
        self.diags.push(Diag {
            message,
            is_error: true,
        });
    }

    /// Records a warning finding.
    pub fn warning<S: Into<String>>(&mut self, msg: S) {
        let message = msg.into();
        trace!("warning : {message}");
        self.num_warnings += 1;
        self.diags.push(Diag {
            message,
            is_error: false,
        });
    }

    /// Returns `true` if any error finding was recorded.
    pub fn has_errors(&self) -> bool {
        self.num_errors != 0
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.diags.is_empty()
    }
}

impl std::fmt::Display for Diags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for diag in &self.diags {
            if diag.is_error {
                writeln!(f, "error: {}", diag.message)?;
            } else {
                writeln!(f, "warning: {}", diag.message)?;
            }
        }
        Ok(())
    }
}

/// Sweeps the export bodies over `[start, end)`.
///
/// Exports are flattened to `(offset, size, name)` and sorted; the sweep
/// tracks the active covered range so every adjacent pair is classified as
/// adjacent, gapped, or overlapping. A tail not covered by exports is fine
/// only when the first bulk entry starts exactly there.
pub fn validate_exports(
    exports: &[Export],
    start: u64,
    end: u64,
    bulk_tables: &[ExternalTable],
    diags: &mut Diags,
) {
    if exports.is_empty() {
        return;
    }

    let mut ranges: Vec<(u64, u64, &str)> = exports
        .iter()
        .map(|e| {
            (
                e.record.object_offset.get(),
                e.record.object_size.get() as u64,
                e.full_name.as_str(),
            )
        })
        .collect();
    ranges.sort();

    let mut prev_off = start;
    let mut prev_end = start;
    let mut prev_name = "";

    for (off, size, name) in ranges {
        if !(start <= off && off < end) {
            diags.error(format!(
                "{name}: offset 0x{off:X} out of bounds [0x{start:X}, 0x{end:X})"
            ));
            continue;
        }
        if off + size > end {
            diags.error(format!(
                "{name}: size 0x{size:X} at 0x{off:X} exceeds end 0x{end:X}"
            ));
            continue;
        }

        if off < prev_end {
            diags.error(format!(
                "{name} [0x{off:X}-0x{:X}) overlaps with {prev_name} [0x{prev_off:X}-0x{prev_end:X})",
                off + size
            ));
        } else if off > prev_end {
            diags.error(format!(
                "unused gap [0x{prev_end:X}-0x{off:X}) before {name}"
            ));
        }

        if off + size > prev_end {
            prev_off = off;
            prev_end = off + size;
            prev_name = name;
        }
    }

    if prev_end < end {
        let first_bulk = bulk_tables
            .iter()
            .flat_map(|t| t.entries.iter())
            .next()
            .map(|e| e.decompressed_offset);
        match first_bulk {
            Some(first) if first == prev_end => {
                // The remainder belongs to the bulk region.
            }
            Some(first) => diags.error(format!(
                "export data ends early at 0x{prev_end:X}, expected bulk at 0x{first:X}"
            )),
            None => diags.error(format!(
                "export data ends early at 0x{prev_end:X}, expected 0x{end:X}"
            )),
        }
    }
}

/// Sweeps the flattened entries of a table group with the same discipline.
/// `start` is the first entry's decompressed offset; `end` is the size of
/// the region the offsets address (the image for bulks, the companion file
/// for PSFs).
pub fn validate_external(kind: &str, tables: &[ExternalTable], end: u64, diags: &mut Diags) {
    let mut ranges: Vec<(u64, u64)> = tables
        .iter()
        .flat_map(|t| t.entries.iter())
        .map(|e| (e.decompressed_offset, e.decompressed_size))
        .collect();
    if ranges.is_empty() {
        return;
    }
    ranges.sort();

    let start = tables
        .iter()
        .flat_map(|t| t.entries.iter())
        .next()
        .map(|e| e.decompressed_offset)
        .unwrap_or(0);

    let mut prev_end = start;
    for (off, size) in ranges {
        if !(start <= off && off < end) {
            diags.error(format!(
                "{kind}: offset 0x{off:X} out of bounds [0x{start:X}, 0x{end:X})"
            ));
            continue;
        }
        if off + size > end {
            diags.error(format!(
                "{kind}: size 0x{size:X} at 0x{off:X} exceeds end 0x{end:X}"
            ));
            continue;
        }

        if off < prev_end {
            diags.error(format!(
                "{kind}: [0x{off:X}-0x{:X}) overlaps with [0x{off:X}-0x{prev_end:X})",
                off + size
            ));
        } else if off > prev_end {
            diags.error(format!("{kind}: unused gap [0x{prev_end:X}-0x{off:X})"));
        }

        prev_end = prev_end.max(off + size);
    }

    if prev_end < end {
        diags.error(format!(
            "{kind}: data ends early at 0x{prev_end:X}, expected 0x{end:X}"
        ));
    }
}
