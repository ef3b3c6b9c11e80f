//! The 96-byte fixed SquashFS superblock

use deku::prelude::*;

use crate::compressor::Compressor;
use crate::error::SquashfsError;

/// Magic bytes, little-endian: `"hsqs"`.
pub const MAGIC: u32 = 0x7371_7368;

/// Sentinel meaning "this table is absent" for 64-bit table-start fields.
pub const NOT_SET: u64 = 0xffff_ffff_ffff_ffff;

/// Sentinel meaning "no fragment"/"no xattr" for index fields.
pub const NOT_SET_32: u32 = 0xffff_ffff;

#[rustfmt::skip]
#[derive(Debug, Copy, Clone)]
pub(crate) enum SuperBlockFlags {
    InodesStoredUncompressed    = 0b0000_0000_0000_0001,
    DataBlockStoredUncompressed = 0b0000_0000_0000_0010,
    FragmentsStoredUncompressed = 0b0000_0000_0000_1000,
    FragmentsAreNotUsed         = 0b0000_0000_0001_0000,
    FragmentsAreAlwaysGenerated = 0b0000_0000_0010_0000,
    DataHasBeenDeduplicated     = 0b0000_0000_0100_0000,
    NFSExportTableExists        = 0b0000_0000_1000_0000,
    XattrsAreStoredUncompressed = 0b0000_0001_0000_0000,
    NoXattrsInArchive           = 0b0000_0010_0000_0000,
    CompressorOptionsArePresent = 0b0000_0100_0000_0000,
}

/// The fixed SquashFS 4.0 header. Immutable after [`SuperBlock::parse`].
#[derive(Debug, Copy, Clone, DekuRead)]
#[deku(endian = "little")]
pub struct SuperBlock {
    pub magic: u32,
    pub inode_count: u32,
    pub mod_time: u32,
    pub block_size: u32,
    pub frag_count: u32,
    compressor_id: u16,
    pub block_log: u16,
    pub flags: u16,
    pub id_count: u16,
    pub version_major: u16,
    pub version_minor: u16,
    pub root_inode_ref: u64,
    pub bytes_used: u64,
    pub id_table_start: u64,
    pub xattr_id_table_start: u64,
    pub inode_table_start: u64,
    pub directory_table_start: u64,
    pub fragment_table_start: u64,
    pub export_table_start: u64,
}

pub(crate) const SUPERBLOCK_SIZE: usize = 96;

impl SuperBlock {
    /// Parse and validate the 96-byte fixed header.
    pub(crate) fn parse(bytes: &[u8; SUPERBLOCK_SIZE]) -> Result<Self, SquashfsError> {
        let ((_rest, _bit_offset), sb) = Self::from_bytes((bytes, 0))?;

        if sb.magic != MAGIC {
            return Err(SquashfsError::CorruptImage("bad magic"));
        }
        if (sb.version_major, sb.version_minor) != (4, 0) {
            return Err(SquashfsError::UnsupportedImage(
                "only SquashFS version 4.0 is supported",
            ));
        }
        if 1u64 << sb.block_log != sb.block_size as u64 {
            return Err(SquashfsError::CorruptImage(
                "block_size and block_log disagree",
            ));
        }
        // Validate eagerly so later code can assume the id is meaningful even
        // though only Gzip is ever actually decompressed.
        Compressor::from_id(sb.compressor_id)?;

        Ok(sb)
    }

    pub fn compressor(&self) -> Compressor {
        // Already validated in `parse`.
        Compressor::from_id(self.compressor_id).expect("validated at parse time")
    }

    pub fn no_fragments(&self) -> bool {
        self.flags & SuperBlockFlags::FragmentsAreNotUsed as u16 != 0
    }

    pub fn no_xattrs(&self) -> bool {
        self.flags & SuperBlockFlags::NoXattrsInArchive as u16 != 0
    }

    pub fn has_xattr_table(&self) -> bool {
        !self.no_xattrs() && self.xattr_id_table_start != NOT_SET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bytes(magic: u32, major: u16, minor: u16, block_size: u32, block_log: u16) -> Vec<u8> {
        let mut v = vec![];
        v.extend(magic.to_le_bytes());
        v.extend(0u32.to_le_bytes()); // inode_count
        v.extend(0u32.to_le_bytes()); // mod_time
        v.extend(block_size.to_le_bytes());
        v.extend(0u32.to_le_bytes()); // frag_count
        v.extend(1u16.to_le_bytes()); // compressor = gzip
        v.extend(block_log.to_le_bytes());
        v.extend(0u16.to_le_bytes()); // flags
        v.extend(0u16.to_le_bytes()); // id_count
        v.extend(major.to_le_bytes());
        v.extend(minor.to_le_bytes());
        v.extend(0u64.to_le_bytes()); // root_inode_ref
        v.extend(0u64.to_le_bytes()); // bytes_used
        v.extend(0u64.to_le_bytes()); // id_table_start
        v.extend(NOT_SET.to_le_bytes()); // xattr_id_table_start
        v.extend(0u64.to_le_bytes()); // inode_table_start
        v.extend(0u64.to_le_bytes()); // directory_table_start
        v.extend(NOT_SET.to_le_bytes()); // fragment_table_start
        v.extend(NOT_SET.to_le_bytes()); // export_table_start
        v
    }

    #[test]
    fn parses_valid_superblock() {
        let bytes: [u8; SUPERBLOCK_SIZE] =
            sample_bytes(MAGIC, 4, 0, 131072, 17).try_into().unwrap();
        let sb = SuperBlock::parse(&bytes).unwrap();
        assert_eq!(sb.block_size, 131072);
        assert!(!sb.has_xattr_table());
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes: [u8; SUPERBLOCK_SIZE] =
            sample_bytes(0x1234_5678, 4, 0, 131072, 17).try_into().unwrap();
        assert!(matches!(
            SuperBlock::parse(&bytes),
            Err(SquashfsError::CorruptImage(_))
        ));
    }

    #[test]
    fn rejects_wrong_version() {
        let bytes: [u8; SUPERBLOCK_SIZE] =
            sample_bytes(MAGIC, 3, 1, 131072, 17).try_into().unwrap();
        assert!(matches!(
            SuperBlock::parse(&bytes),
            Err(SquashfsError::UnsupportedImage(_))
        ));
    }

    #[test]
    fn rejects_block_size_log_mismatch() {
        let bytes: [u8; SUPERBLOCK_SIZE] =
            sample_bytes(MAGIC, 4, 0, 131072, 10).try_into().unwrap();
        assert!(matches!(
            SuperBlock::parse(&bytes),
            Err(SquashfsError::CorruptImage(_))
        ));
    }
}
