//! UID/GID lookup table
//!
//! Inodes never store a raw numeric id; they store an index into this table,
//! which is itself loaded through the indirect block-pointer scheme (see
//! [`crate::metadata::load_indirect`]) with 2048 four-byte entries per block.

use crate::compressor::Compressor;
use crate::error::SquashfsError;
use crate::metadata;
use crate::reader::{ByteSource, Cursor};

/// Entries per decompressed metadata block for the id table.
pub(crate) const ENTRIES_PER_BLOCK: u64 = 2048;

/// Load the ordered `ids[0..id_count]` array.
pub(crate) fn load(
    source: &dyn ByteSource,
    compressor: Compressor,
    table_start: u64,
    id_count: u16,
) -> Result<Vec<u32>, SquashfsError> {
    let id_count = id_count as u64;
    if id_count == 0 {
        return Ok(Vec::new());
    }

    let block_count = (id_count + ENTRIES_PER_BLOCK - 1) / ENTRIES_PER_BLOCK;
    let buf = metadata::load_indirect(source, compressor, table_start, block_count)?;

    let mut cursor = Cursor::new(&buf);
    let mut ids = Vec::with_capacity(id_count as usize);
    for _ in 0..id_count {
        ids.push(cursor.read_u32()?);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_empty_table() {
        let ids = load(&[][..], Compressor::Gzip, 0, 0).unwrap();
        assert!(ids.is_empty());
    }
}
