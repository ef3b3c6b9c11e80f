//! Fragment (tail-block) descriptor table

use crate::compressor::Compressor;
use crate::error::SquashfsError;
use crate::metadata;
use crate::reader::{ByteSource, Cursor};

/// Entries per decompressed metadata block for the fragment table.
pub(crate) const ENTRIES_PER_BLOCK: u64 = 512;

const UNCOMPRESSED_BIT: u32 = 1 << 24;
const MAX_FRAGMENT_SIZE: u32 = 1 << 20;

/// One fragment block: a shared tail block packing together the sub-block
/// residues of several small files.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub start: u64,
    pub size: u32,
    pub compressed: bool,
}

/// Load the fragment table, or `None` when fragments are absent from the
/// image (superblock flag `0x0010`, a zero entry count, or the sentinel
/// table-start value).
pub(crate) fn load(
    source: &dyn ByteSource,
    compressor: Compressor,
    table_start: u64,
    frag_count: u32,
    no_fragments: bool,
) -> Result<Option<Vec<Fragment>>, SquashfsError> {
    if no_fragments || frag_count == 0 || table_start == crate::superblock::NOT_SET {
        return Ok(None);
    }

    let count = frag_count as u64;
    let block_count = (count + ENTRIES_PER_BLOCK - 1) / ENTRIES_PER_BLOCK;
    let buf = metadata::load_indirect(source, compressor, table_start, block_count)?;

    let mut cursor = Cursor::new(&buf);
    let mut fragments = Vec::with_capacity(frag_count as usize);
    for _ in 0..frag_count {
        let start = cursor.read_u64()?;
        let raw_size = cursor.read_u32()?;
        let _unused = cursor.read_u32()?;

        let compressed = raw_size & UNCOMPRESSED_BIT == 0;
        let size = raw_size & !UNCOMPRESSED_BIT;
        if size > MAX_FRAGMENT_SIZE {
            return Err(SquashfsError::CorruptImage("fragment size exceeds 1 MiB"));
        }

        fragments.push(Fragment {
            start,
            size,
            compressed,
        });
    }

    Ok(Some(fragments))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_bytes(start: u64, raw_size: u32) -> Vec<u8> {
        let mut v = start.to_le_bytes().to_vec();
        v.extend(raw_size.to_le_bytes());
        v.extend(0u32.to_le_bytes());
        v
    }

    #[test]
    fn decodes_compressed_and_uncompressed_flags() {
        let mut table = vec![];
        table.extend(entry_bytes(0, 100));
        table.extend(entry_bytes(200, 50 | UNCOMPRESSED_BIT));

        let mut image = 0u64.to_le_bytes().to_vec(); // pointer to block
        let mut block = ((table.len() as u16) | (1 << 15)).to_le_bytes().to_vec();
        block.extend(table);
        image.extend(block);

        let fragments = load(&image, Compressor::Gzip, 0, 2, false)
            .unwrap()
            .unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].size, 100);
        assert!(fragments[0].compressed);
        assert_eq!(fragments[1].size, 50);
        assert!(!fragments[1].compressed);
    }

    #[test]
    fn oversized_fragment_is_corrupt() {
        let table = entry_bytes(0, MAX_FRAGMENT_SIZE + 1);
        let mut image = 0u64.to_le_bytes().to_vec();
        let mut block = ((table.len() as u16) | (1 << 15)).to_le_bytes().to_vec();
        block.extend(table);
        image.extend(block);

        let err = load(&image, Compressor::Gzip, 0, 1, false).unwrap_err();
        assert!(matches!(err, SquashfsError::CorruptImage(_)));
    }

    #[test]
    fn skipped_when_flag_set() {
        assert!(load(&[][..], Compressor::Gzip, 0, 5, true).unwrap().is_none());
    }
}
