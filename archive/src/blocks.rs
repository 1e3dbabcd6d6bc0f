//! Block decompression: a block header, a run of chunk headers, then the
//! chunk payloads in the same order.

use crate::compress::Decompress;
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::{BlockHeader, ChunkHeader, SUMMARY_MAGIC};
use tracing::{trace, warn};

/// Reads and decompresses one block at the cursor's current position.
///
/// Chunk headers are enumerated until their summed compressed sizes reach the
/// block's `compressed_size`; overshooting it is a corrupt block. Each chunk
/// is handed to `dec` with its declared decompressed size, and the
/// concatenated output must match the block's `decompressed_size`.
pub fn read_block(c: &mut Cursor<'_>, dec: &dyn Decompress) -> Result<Vec<u8>> {
    let block_pos = c.position();
    let block: BlockHeader = c.record()?;
    if block.magic.get() != SUMMARY_MAGIC {
        warn!(
            pos = block_pos,
            magic = format_args!("0x{:08X}", block.magic.get()),
            "block header magic mismatch"
        );
    }

    let compressed_total = block.compressed_size.get();
    let mut chunks: Vec<ChunkHeader> = Vec::new();
    let mut summed: u64 = 0;
    while summed < compressed_total {
        let chunk: ChunkHeader = c.record()?;
        summed += chunk.compressed_size.get();
        chunks.push(chunk);
    }
    if summed != compressed_total {
        return Err(Error::CorruptBlock {
            pos: block_pos,
            reason: format!(
                "chunk compressed sizes sum to 0x{summed:X}, block declares 0x{compressed_total:X}"
            ),
        });
    }

    trace!(
        pos = block_pos,
        chunks = chunks.len(),
        compressed = compressed_total,
        decompressed = block.decompressed_size.get(),
        "decompressing block"
    );

    let mut out = Vec::with_capacity(block.decompressed_size.get() as usize);
    for chunk in &chunks {
        let chunk_pos = c.position();
        let payload = c.read_bytes(chunk.compressed_size.get() as usize)?;
        let expected = chunk.decompressed_size.get() as usize;
        let data = dec.decompress(&payload, expected)?;
        if data.len() != expected {
            return Err(Error::CorruptBlock {
                pos: chunk_pos,
                reason: format!(
                    "chunk decompressed to 0x{:X} bytes, expected 0x{expected:X}",
                    data.len()
                ),
            });
        }
        out.extend_from_slice(&data);
    }

    if out.len() as u64 != block.decompressed_size.get() {
        return Err(Error::CorruptBlock {
            pos: block_pos,
            reason: format!(
                "block decompressed to 0x{:X} bytes, header declares 0x{:X}",
                out.len(),
                block.decompressed_size.get()
            ),
        });
    }

    Ok(out)
}
