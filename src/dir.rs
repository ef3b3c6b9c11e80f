//! Directory table reader
//!
//! A directory's entries are grouped into headers sharing a base inode
//! number and a base metadata block; each entry then carries a signed delta
//! against that base inode number and an offset into the shared block.

use crate::error::SquashfsError;
use crate::metadata::Table;
use crate::reader::Cursor;

/// One child of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: Vec<u8>,
    /// Raw inode-type tag (1..=14) as stored by the directory entry.
    pub entry_type: u16,
    /// Metadata block offset (relative to the directory table's start) of
    /// the child's inode.
    pub child_block: u64,
    /// Intra-block offset of the child's inode.
    pub child_offset: usize,
    pub inode_number: u32,
}

const MAX_ENTRIES_PER_GROUP: u32 = 256;

/// Iterate a directory's entries.
///
/// `block` and `offset` locate the start of the directory's entry region in
/// the directory table (relative to the table's own start, i.e. a directory
/// inode's `blk_idx`/`blk_offset`); `file_size` is the inode's stored size,
/// which overcounts the true region length by 3 bytes per the SquashFS
/// on-disk convention.
pub(crate) fn read_entries(
    table: &Table,
    block: u64,
    offset: usize,
    file_size: u32,
) -> Result<Vec<DirEntry>, SquashfsError> {
    let start = table.resolve(block, offset)?;
    let region_len = (file_size as usize)
        .checked_sub(3)
        .ok_or(SquashfsError::CorruptImage("directory file_size underflows"))?;
    let end = start
        .checked_add(region_len)
        .ok_or(SquashfsError::CorruptImage("directory region overruns table"))?;

    let buf = table.bytes();
    if end > buf.len() {
        return Err(SquashfsError::CorruptImage(
            "directory region overruns table",
        ));
    }

    let mut cursor = Cursor::at(buf, start);
    let mut entries = Vec::new();

    while cursor.position() < end {
        let count = cursor.read_u32()?;
        let base_block = cursor.read_u32()? as u64;
        let base_inode = cursor.read_u32()?;

        if count >= MAX_ENTRIES_PER_GROUP {
            return Err(SquashfsError::CorruptImage(
                "directory group has too many entries",
            ));
        }

        for _ in 0..=count {
            let entry_offset = cursor.read_u16()?;
            let inode_delta = cursor.read_i16()?;
            let entry_type = cursor.read_u16()?;
            let name_size = cursor.read_u16()?;
            let name = cursor.read_bytes(name_size as usize + 1)?.to_vec();

            entries.push(DirEntry {
                name,
                entry_type,
                child_block: base_block,
                child_offset: entry_offset as usize,
                inode_number: base_inode.wrapping_add(inode_delta as i32 as u32),
            });
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::Compressor;

    fn build_group(base_block: u32, base_inode: u32, entries: &[(u16, i16, u16, &[u8])]) -> Vec<u8> {
        let mut buf = vec![];
        buf.extend(((entries.len() - 1) as u32).to_le_bytes());
        buf.extend(base_block.to_le_bytes());
        buf.extend(base_inode.to_le_bytes());
        for (offset, delta, typ, name) in entries {
            buf.extend(offset.to_le_bytes());
            buf.extend(delta.to_le_bytes());
            buf.extend(typ.to_le_bytes());
            buf.extend(((name.len() - 1) as u16).to_le_bytes());
            buf.extend(*name);
        }
        buf
    }

    fn table_from(buf: Vec<u8>) -> Table {
        // Build a one-block stored (uncompressed) metadata table so
        // `Table::resolve` maps block 0 to buffer offset 0.
        let header = ((buf.len() as u16) | (1 << 15)).to_le_bytes();
        let mut image = header.to_vec();
        image.extend(buf);
        crate::metadata::load_table(&image, Compressor::Gzip, 0, image.len() as u64).unwrap()
    }

    #[test]
    fn reads_single_group() {
        let region = build_group(
            0,
            100,
            &[(0x10, 0, 2, b"aa\0"), (0x20, 5, 1, b"bb\0")],
        );
        let file_size = (region.len() + 3) as u32;
        let table = table_from(region);

        let entries = read_entries(&table, 0, 0, file_size).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, b"aa\0");
        assert_eq!(entries[0].inode_number, 100);
        assert_eq!(entries[1].inode_number, 105);
        assert_eq!(entries[1].entry_type, 1);
    }

    #[test]
    fn rejects_group_count_overflow() {
        let mut region = vec![];
        region.extend(256u32.to_le_bytes());
        region.extend(0u32.to_le_bytes());
        region.extend(0u32.to_le_bytes());
        let file_size = (region.len() + 3) as u32;
        let table = table_from(region);

        let err = read_entries(&table, 0, 0, file_size).unwrap_err();
        assert!(matches!(err, SquashfsError::CorruptImage(_)));
    }
}
