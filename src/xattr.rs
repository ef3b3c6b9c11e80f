//! Extended attribute subsystem
//!
//! A two-level indirection: the id table maps an inode's `xattr_idx` to a
//! lookup-table entry, which points at a run of attribute records inside the
//! attribute table. Attribute values may be stored inline or out-of-line
//! (another two-part cursor back into the same attribute table).

use crate::compressor::Compressor;
use crate::error::SquashfsError;
use crate::metadata::{self, split_ref, Table};
use crate::reader::{ByteSource, Cursor};
use crate::superblock::NOT_SET;

/// Entries per decompressed metadata block for the xattr lookup table.
const ENTRIES_PER_BLOCK: u64 = 512;
const OUT_OF_LINE_BIT: u16 = 0x0100;
const NAMESPACE_MASK: u16 = 0x00ff;

/// An ordered `name -> value` mapping for one inode's extended attributes.
pub type XattrMap = Vec<(Vec<u8>, Vec<u8>)>;

struct LookupEntry {
    xattr_ref: u64,
    count: u32,
}

fn namespace_prefix(tag: u16) -> Result<&'static [u8], SquashfsError> {
    match tag & NAMESPACE_MASK {
        0 => Ok(b"user."),
        1 => Ok(b"trusted."),
        2 => Ok(b"security."),
        _ => Err(SquashfsError::CorruptImage("unknown xattr namespace")),
    }
}

/// Load the full xattr subsystem: returns `xattrs[xattr_idx]` for every
/// xattr id in the image, or `None` when the image carries no xattr table.
pub(crate) fn load(
    source: &dyn ByteSource,
    compressor: Compressor,
    xattr_id_table_start: u64,
    no_xattrs: bool,
) -> Result<Option<Vec<XattrMap>>, SquashfsError> {
    if no_xattrs || xattr_id_table_start == NOT_SET {
        return Ok(None);
    }

    let mut preamble = [0u8; 16];
    source.read_at(xattr_id_table_start, &mut preamble)?;
    let mut c = Cursor::new(&preamble);
    let xattr_table_start = c.read_u64()?;
    let xattr_ids = c.read_u32()?;
    let _unused = c.read_u32()?;

    let block_count = (xattr_ids as u64 + ENTRIES_PER_BLOCK - 1) / ENTRIES_PER_BLOCK;
    // The lookup table's array of block pointers starts right after the
    // 16-byte preamble.
    let lookup_ptr_array_start = xattr_id_table_start + 16;
    let lookup_buf = metadata::load_indirect(
        source,
        compressor,
        lookup_ptr_array_start,
        block_count,
    )?;

    let mut lookup_cursor = Cursor::new(&lookup_buf);
    let mut lookups = Vec::with_capacity(xattr_ids as usize);
    for _ in 0..xattr_ids {
        let xattr_ref = lookup_cursor.read_u64()?;
        let count = lookup_cursor.read_u32()?;
        let _size = lookup_cursor.read_u32()?;
        lookups.push(LookupEntry { xattr_ref, count });
    }

    let attr_table = metadata::load_table(
        source,
        compressor,
        xattr_table_start,
        xattr_id_table_start,
    )?;

    let mut result = Vec::with_capacity(lookups.len());
    for entry in &lookups {
        result.push(read_attributes(&attr_table, entry.xattr_ref, entry.count)?);
    }

    Ok(Some(result))
}

fn read_attributes(
    table: &Table,
    xattr_ref: u64,
    count: u32,
) -> Result<XattrMap, SquashfsError> {
    let (block, offset) = split_ref(xattr_ref);
    let start = table.resolve(block, offset)?;
    let mut cursor = Cursor::at(table.bytes(), start);

    let mut map = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let tag = cursor.read_u16()?;
        let name_size = cursor.read_u16()?;
        let name = cursor.read_bytes(name_size as usize)?.to_vec();
        let value_size = cursor.read_u32()?;

        let value = if tag & OUT_OF_LINE_BIT != 0 {
            let value_ref = cursor.read_u64()?;
            let (vblock, voffset) = split_ref(value_ref);
            let vpos = table.resolve(vblock, voffset)?;
            let mut vcursor = Cursor::at(table.bytes(), vpos);
            let out_of_line_size = vcursor.read_u32()?;
            vcursor.read_bytes(out_of_line_size as usize)?.to_vec()
        } else {
            cursor.read_bytes(value_size as usize)?.to_vec()
        };

        let mut full_name = namespace_prefix(tag)?.to_vec();
        full_name.extend_from_slice(&name);
        map.push((full_name, value));
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_block(data: &[u8]) -> Vec<u8> {
        let header = ((data.len() as u16) | (1 << 15)).to_le_bytes();
        let mut block = header.to_vec();
        block.extend(data);
        block
    }

    #[test]
    fn loads_inline_attribute() {
        // Attribute table: one record, user.foo = "bar"
        let mut attr_record = vec![];
        attr_record.extend(0u16.to_le_bytes()); // tag: user namespace, inline
        attr_record.extend(3u16.to_le_bytes()); // name_size
        attr_record.extend(b"foo");
        attr_record.extend(3u32.to_le_bytes()); // value_size
        attr_record.extend(b"bar");
        let attr_block = stored_block(&attr_record);
        let attr_table_start = 0u64;

        // Lookup table: one entry pointing at attribute block 0, offset 0, count 1
        let mut lookup_entry = vec![];
        lookup_entry.extend(0u64.to_le_bytes()); // xattr_ref == (block 0 << 16) | 0
        lookup_entry.extend(1u32.to_le_bytes()); // count
        lookup_entry.extend(0u32.to_le_bytes()); // size
        let lookup_block = stored_block(&lookup_entry);

        // Image layout: [attribute table][16-byte preamble][lookup ptr array][lookup block]
        let mut image = attr_block;
        let preamble_start = image.len() as u64;
        image.extend(std::iter::repeat(0u8).take(16));

        let ptr_array_start = image.len() as u64;
        let lookup_block_start = ptr_array_start + 8;
        image.extend(lookup_block_start.to_le_bytes());
        image.extend(&lookup_block);

        image[preamble_start as usize..preamble_start as usize + 8]
            .copy_from_slice(&attr_table_start.to_le_bytes());
        image[preamble_start as usize + 8..preamble_start as usize + 12]
            .copy_from_slice(&1u32.to_le_bytes());
        image[preamble_start as usize + 12..preamble_start as usize + 16]
            .copy_from_slice(&0u32.to_le_bytes());

        let maps = load(&image, Compressor::Gzip, preamble_start, false)
            .unwrap()
            .unwrap();
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0], vec![(b"user.foo".to_vec(), b"bar".to_vec())]);
    }

    #[test]
    fn namespace_prefix_rejects_unknown() {
        assert!(namespace_prefix(3).is_err());
        assert_eq!(namespace_prefix(0x0100).unwrap(), b"user.");
    }
}
