//! Metadata-block codec and logical table loader
//!
//! SquashFS stores every structured table (inodes, directories, ids,
//! fragments, xattrs) as a chain of independently compressed blocks of at
//! most 8 KiB of decompressed payload. Concatenating the payloads in order
//! gives the logical table; a block's position in the image is addressed
//! through the two-part cursor `(block_start_in_image, offset_in_block)`.

use rustc_hash::FxHashMap;

use crate::compressor::{self, Compressor};
use crate::error::SquashfsError;
use crate::reader::ByteSource;

/// Maximum number of decompressed bytes a single metadata block may hold.
pub(crate) const METADATA_MAXSIZE: usize = 8192;

const METADATA_COMPRESSED_BIT: u16 = 1 << 15;
const METADATA_SIZE_MASK: u16 = !METADATA_COMPRESSED_BIT;

/// Split a 64-bit inode/xattr reference into `(block_start_in_image, offset)`.
pub(crate) fn split_ref(r: u64) -> (u64, usize) {
    ((r >> 16) & 0xffff_ffff, (r & 0xffff) as usize)
}

/// Read one metadata block's 2-byte header plus payload at `offset`,
/// returning the (decompressed) payload and the offset of the next block.
pub(crate) fn read_block(
    source: &dyn ByteSource,
    offset: u64,
    compressor: Compressor,
) -> Result<(Vec<u8>, u64), SquashfsError> {
    let mut header = [0u8; 2];
    source.read_at(offset, &mut header)?;
    let header = u16::from_le_bytes(header);

    let size = (header & METADATA_SIZE_MASK) as usize;
    let is_compressed = header & METADATA_COMPRESSED_BIT == 0;

    if size > METADATA_MAXSIZE {
        return Err(SquashfsError::CorruptImage(
            "metadata block payload exceeds 8 KiB",
        ));
    }

    let mut payload = vec![0u8; size];
    source.read_at(offset + 2, &mut payload)?;

    let payload = if is_compressed {
        compressor::decompress(&payload, compressor)?
    } else {
        payload
    };

    let next = offset + 2 + size as u64;
    Ok((payload, next))
}

/// A logical table materialised from a chain of metadata blocks, plus an
/// index mapping each block's in-image starting offset (relative to the
/// table's own start) to its offset inside the concatenated buffer.
pub(crate) struct Table {
    buf: Vec<u8>,
    index: FxHashMap<u64, usize>,
}

impl Table {
    /// Resolve a two-part cursor `(block_start, offset)` -- where
    /// `block_start` is already relative to this table's start -- into a
    /// byte offset within the materialised buffer.
    pub(crate) fn resolve(&self, block_start: u64, offset: usize) -> Result<usize, SquashfsError> {
        let base = *self
            .index
            .get(&block_start)
            .ok_or(SquashfsError::CorruptImage("unknown metadata block offset"))?;
        base.checked_add(offset)
            .ok_or(SquashfsError::CorruptImage("cursor offset overflow"))
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn slice_from(&self, pos: usize) -> Result<&[u8], SquashfsError> {
        self.buf
            .get(pos..)
            .ok_or(SquashfsError::CorruptImage("offset past end of table"))
    }
}

/// Walk the metadata-block chain from `table_start` until the cursor reaches
/// `table_end`, concatenating decompressed payloads and recording the index.
pub(crate) fn load_table(
    source: &dyn ByteSource,
    compressor: Compressor,
    table_start: u64,
    table_end: u64,
) -> Result<Table, SquashfsError> {
    let mut buf = Vec::new();
    let mut index = FxHashMap::default();
    let mut cursor = table_start;

    while cursor < table_end {
        index.insert(cursor - table_start, buf.len());
        let (payload, next) = read_block(source, cursor, compressor)?;
        if next > table_end {
            return Err(SquashfsError::CorruptImage(
                "metadata block overruns table boundary",
            ));
        }
        buf.extend_from_slice(&payload);
        cursor = next;
    }

    Ok(Table { buf, index })
}

/// Load a table stored via the indirect block-pointer scheme used by the id,
/// fragment, and xattr-lookup tables: an array of `u64` image offsets lives
/// at `ptr_array_start`, each entry pointing at one metadata block, and the
/// concatenation of those blocks (in array order) is the logical table.
pub(crate) fn load_indirect(
    source: &dyn ByteSource,
    compressor: Compressor,
    ptr_array_start: u64,
    block_count: u64,
) -> Result<Vec<u8>, SquashfsError> {
    let mut buf = Vec::new();
    for i in 0..block_count {
        let mut ptr_bytes = [0u8; 8];
        source.read_at(ptr_array_start + i * 8, &mut ptr_bytes)?;
        let block_offset = u64::from_le_bytes(ptr_bytes);
        let (mut payload, _next) = read_block(source, block_offset, compressor)?;
        buf.append(&mut payload);
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    use super::*;

    fn compressed_block(data: &[u8]) -> Vec<u8> {
        let mut e = ZlibEncoder::new(Vec::new(), Compression::default());
        e.write_all(data).unwrap();
        let compressed = e.finish().unwrap();
        let mut block = (compressed.len() as u16).to_le_bytes().to_vec();
        block.extend_from_slice(&compressed);
        block
    }

    fn stored_block(data: &[u8]) -> Vec<u8> {
        let header = (data.len() as u16) | METADATA_COMPRESSED_BIT;
        let mut block = header.to_le_bytes().to_vec();
        block.extend_from_slice(data);
        block
    }

    #[test]
    fn read_block_handles_compressed_and_stored() {
        let mut image = vec![];
        image.extend(compressed_block(b"hello "));
        let second_start = image.len() as u64;
        image.extend(stored_block(b"world"));

        let (payload, next) = read_block(&image, 0, Compressor::Gzip).unwrap();
        assert_eq!(payload, b"hello ");
        assert_eq!(next, second_start);

        let (payload, next) = read_block(&image, second_start, Compressor::Gzip).unwrap();
        assert_eq!(payload, b"world");
        assert_eq!(next, image.len() as u64);
    }

    #[test]
    fn load_table_builds_index_over_multiple_blocks() {
        let mut image = vec![];
        image.extend(stored_block(b"aaaa"));
        let second = image.len() as u64;
        image.extend(stored_block(b"bb"));
        let end = image.len() as u64;

        let table = load_table(&image, Compressor::Gzip, 0, end).unwrap();
        assert_eq!(table.bytes(), b"aaaabb");
        assert_eq!(table.resolve(0, 0).unwrap(), 0);
        assert_eq!(table.resolve(second, 1).unwrap(), 5);
    }

    #[test]
    fn oversized_payload_is_corrupt() {
        let header = (METADATA_MAXSIZE as u16 + 1) | METADATA_COMPRESSED_BIT;
        let image = header.to_le_bytes();
        let err = read_block(&image[..], 0, Compressor::Gzip).unwrap_err();
        assert!(matches!(err, SquashfsError::CorruptImage(_)));
    }
}
