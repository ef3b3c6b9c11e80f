//! Per-block data sizes and the file-data reconstructor
//!
//! Each data block belonging to a file carries its compressed size as a
//! 32-bit word; the high bit doubles as a storage-mode flag, and a size of
//! zero denotes a sparse hole. This module exposes that as an explicit mode
//! rather than overloading the integer everywhere it's read.

use deku::prelude::*;
use tracing::instrument;

use crate::compressor::{self, Compressor};
use crate::error::SquashfsError;
use crate::fragment::Fragment;
use crate::reader::ByteSource;

const UNCOMPRESSED_BIT: u32 = 1 << 24;

/// Sentinel `frag_index` meaning "this file has no fragment tail".
pub(crate) const NO_FRAGMENT: u32 = 0xffff_ffff;

/// How one on-disk data block is stored.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BlockMode {
    /// zlib-compressed; decompresses to exactly `block_size` bytes (less for
    /// a final block with no trailing fragment).
    Compressed,
    /// Stored literally, uncompressed.
    Stored,
    /// A sparse hole: contributes `block_size` zero bytes, occupies no
    /// space in the data region.
    Hole,
}

/// The raw 32-bit size word for one file data block.
#[derive(Debug, Copy, Clone, PartialEq, Eq, DekuRead)]
#[deku(endian = "little")]
pub struct DataSize(u32);

impl From<u32> for DataSize {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl DataSize {
    pub fn mode(&self) -> BlockMode {
        if self.0 == 0 {
            BlockMode::Hole
        } else if self.0 & UNCOMPRESSED_BIT != 0 {
            BlockMode::Stored
        } else {
            BlockMode::Compressed
        }
    }

    /// Number of bytes this block occupies in the data region (0 for a hole).
    pub fn on_disk_len(&self) -> u32 {
        self.0 & !UNCOMPRESSED_BIT
    }
}

/// Number of blocks a file inode's `block_sizes` array holds, per §3/§4.6.
pub(crate) fn block_count(block_size: u32, frag_index: u32, file_size: u64) -> u64 {
    if frag_index == NO_FRAGMENT {
        (file_size + u64::from(block_size) - 1) / u64::from(block_size)
    } else {
        file_size / u64::from(block_size)
    }
}

/// Reconstruct a file's contents: the fixed-size data blocks starting at
/// `blocks_start`, followed by the optional shared fragment tail.
#[instrument(skip(source, block_sizes, fragments))]
pub(crate) fn read_file(
    source: &dyn ByteSource,
    compressor: Compressor,
    block_size: u32,
    blocks_start: u64,
    block_sizes: &[DataSize],
    frag_index: u32,
    frag_block_offset: u32,
    file_size: u64,
    fragments: Option<&[Fragment]>,
) -> Result<Vec<u8>, SquashfsError> {
    let mut out = Vec::with_capacity(file_size as usize);
    let mut offset = blocks_start;

    for size in block_sizes {
        match size.mode() {
            BlockMode::Hole => {
                out.resize(out.len() + block_size as usize, 0);
            }
            BlockMode::Stored => {
                let len = size.on_disk_len() as usize;
                let mut buf = vec![0u8; len];
                source.read_at(offset, &mut buf)?;
                out.extend_from_slice(&buf);
                offset += len as u64;
            }
            BlockMode::Compressed => {
                let len = size.on_disk_len() as usize;
                let mut buf = vec![0u8; len];
                source.read_at(offset, &mut buf)?;
                let decompressed = compressor::decompress(&buf, compressor)?;
                out.extend_from_slice(&decompressed);
                offset += len as u64;
            }
        }
    }

    if frag_index != NO_FRAGMENT {
        let fragments = fragments.ok_or(SquashfsError::CorruptImage(
            "file references a fragment but image has no fragment table",
        ))?;
        let frag = fragments
            .get(frag_index as usize)
            .ok_or(SquashfsError::CorruptImage("fragment index out of range"))?;

        let mut raw = vec![0u8; frag.size as usize];
        source.read_at(frag.start, &mut raw)?;
        let frag_bytes = if frag.compressed {
            compressor::decompress(&raw, compressor)?
        } else {
            raw
        };

        // When file_size is an exact multiple of block_size there is no
        // trailing partial block; the tail length below is then zero and
        // this appends nothing. The on-disk format has no positive handling
        // for this case, so the zero-length append is intentional, mirroring
        // the reference implementation rather than special-casing it away.
        let tail_len = (file_size % block_size as u64) as usize;
        let start = frag_block_offset as usize;
        let end = start
            .checked_add(tail_len)
            .ok_or(SquashfsError::CorruptImage("fragment slice overruns block"))?;
        let slice = frag_bytes
            .get(start..end)
            .ok_or(SquashfsError::CorruptImage("fragment slice overruns block"))?;
        out.extend_from_slice(slice);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_size_decodes_mode() {
        assert_eq!(DataSize(0).mode(), BlockMode::Hole);
        assert_eq!(DataSize(100).mode(), BlockMode::Compressed);
        assert_eq!(DataSize(100 | UNCOMPRESSED_BIT).mode(), BlockMode::Stored);
        assert_eq!(DataSize(100 | UNCOMPRESSED_BIT).on_disk_len(), 100);
    }

    #[test]
    fn block_count_matches_fragment_presence() {
        assert_eq!(block_count(1024, 0xffff_ffff, 2048), 2);
        assert_eq!(block_count(1024, 0xffff_ffff, 2049), 3);
        assert_eq!(block_count(1024, 0, 2049), 2);
    }
}
