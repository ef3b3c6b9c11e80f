//! Tagged inode records
//!
//! Every inode starts with a 16-byte common header (type tag plus
//! permissions/owner/group indices, mtime and inode number) followed by a
//! type-specific body. Basic and Extended variants of the same kind share
//! the same body fields; Extended additionally carries an xattr index and,
//! for directories and files, 64-bit sizes/offsets and a hard-link count.
//!
//! Rather than eagerly decoding the whole inode table into an
//! inode-number-keyed map, inodes are decoded lazily from the two-part
//! cursor (`blk_idx`, `blk_offset`) stored in directory entries and the
//! superblock's `root_inode_ref`, matching how callers actually reach them.

use crate::data::{self, DataSize};
use crate::error::SquashfsError;
use crate::metadata::Table;
use crate::reader::Cursor;
use crate::superblock::NOT_SET_32;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum InodeId {
    BasicDirectory = 1,
    BasicFile = 2,
    BasicSymlink = 3,
    BasicBlockDevice = 4,
    BasicCharDevice = 5,
    BasicFifo = 6,
    BasicSocket = 7,
    ExtendedDirectory = 8,
    ExtendedFile = 9,
    ExtendedSymlink = 10,
    ExtendedBlockDevice = 11,
    ExtendedCharDevice = 12,
    ExtendedFifo = 13,
    ExtendedSocket = 14,
}

impl InodeId {
    fn from_tag(tag: u16) -> Result<Self, SquashfsError> {
        Ok(match tag {
            1 => Self::BasicDirectory,
            2 => Self::BasicFile,
            3 => Self::BasicSymlink,
            4 => Self::BasicBlockDevice,
            5 => Self::BasicCharDevice,
            6 => Self::BasicFifo,
            7 => Self::BasicSocket,
            8 => Self::ExtendedDirectory,
            9 => Self::ExtendedFile,
            10 => Self::ExtendedSymlink,
            11 => Self::ExtendedBlockDevice,
            12 => Self::ExtendedCharDevice,
            13 => Self::ExtendedFifo,
            14 => Self::ExtendedSocket,
            _ => return Err(SquashfsError::CorruptImage("unknown inode type tag")),
        })
    }
}

/// The 16-byte header shared by all 14 inode variants.
#[derive(Debug, Copy, Clone)]
pub struct InodeHeader {
    pub permissions: u16,
    pub uid_idx: u16,
    pub gid_idx: u16,
    pub modified_time: u32,
    pub inode_number: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct DirectoryInfo {
    pub blk_idx: u32,
    pub blk_offset: u16,
    pub link_count: u32,
    pub file_size: u32,
    pub parent_inode: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct FileInfo {
    pub blocks_start: u64,
    pub frag_index: u32,
    pub block_offset: u32,
    pub file_size: u64,
    pub block_sizes: Vec<DataSize>,
}

#[derive(Debug, Clone)]
pub(crate) struct DeviceInfo {
    pub link_count: u32,
    pub device_number: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct IpcInfo {
    pub link_count: u32,
}

#[derive(Debug, Clone)]
pub(crate) enum InodeBody {
    Directory(DirectoryInfo),
    File(FileInfo),
    Symlink { link_count: u32, target: Vec<u8> },
    BlockDevice(DeviceInfo),
    CharDevice(DeviceInfo),
    Fifo(IpcInfo),
    Socket(IpcInfo),
}

#[derive(Debug, Clone)]
pub struct Inode {
    pub header: InodeHeader,
    /// `NOT_SET_32` for Basic variants, which carry no xattr index at all.
    pub(crate) xattr_idx: u32,
    pub(crate) body: InodeBody,
}

impl Inode {
    pub fn inode_number(&self) -> u32 {
        self.header.inode_number
    }

    pub fn xattr_idx(&self) -> Option<u32> {
        (self.xattr_idx != NOT_SET_32).then_some(self.xattr_idx)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.body, InodeBody::Directory(_))
    }

    pub fn is_file(&self) -> bool {
        matches!(self.body, InodeBody::File(_))
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self.body, InodeBody::Symlink { .. })
    }

    pub fn is_block_dev(&self) -> bool {
        matches!(self.body, InodeBody::BlockDevice(_))
    }

    pub fn is_char_dev(&self) -> bool {
        matches!(self.body, InodeBody::CharDevice(_))
    }

    pub fn is_fifo(&self) -> bool {
        matches!(self.body, InodeBody::Fifo(_))
    }

    pub fn is_socket(&self) -> bool {
        matches!(self.body, InodeBody::Socket(_))
    }

    /// `st_size`. Zero for the inode kinds POSIX has no notion of a size for.
    pub fn size(&self) -> u64 {
        match &self.body {
            InodeBody::Directory(d) => d.file_size as u64,
            InodeBody::File(f) => f.file_size,
            InodeBody::Symlink { target, .. } => target.len() as u64,
            _ => 0,
        }
    }

    pub(crate) fn directory_info(&self) -> Option<&DirectoryInfo> {
        match &self.body {
            InodeBody::Directory(d) => Some(d),
            _ => None,
        }
    }

    pub(crate) fn file_info(&self) -> Option<&FileInfo> {
        match &self.body {
            InodeBody::File(f) => Some(f),
            _ => None,
        }
    }

    pub fn symlink_target(&self) -> Option<&[u8]> {
        match &self.body {
            InodeBody::Symlink { target, .. } => Some(target),
            _ => None,
        }
    }

}

fn read_header(cursor: &mut Cursor) -> Result<InodeHeader, SquashfsError> {
    Ok(InodeHeader {
        permissions: cursor.read_u16()?,
        uid_idx: cursor.read_u16()?,
        gid_idx: cursor.read_u16()?,
        modified_time: cursor.read_u32()?,
        inode_number: cursor.read_u32()?,
    })
}

fn read_block_sizes(
    cursor: &mut Cursor,
    block_size: u32,
    frag_index: u32,
    file_size: u64,
) -> Result<Vec<DataSize>, SquashfsError> {
    let count = data::block_count(block_size, frag_index, file_size);
    let mut sizes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        sizes.push(DataSize::from(cursor.read_u32()?));
    }
    Ok(sizes)
}

/// Decode one inode record at `(blk_idx, blk_offset)` in the materialised
/// inode table.
pub(crate) fn read_inode(
    table: &Table,
    block_size: u32,
    blk_idx: u64,
    blk_offset: usize,
) -> Result<Inode, SquashfsError> {
    let start = table.resolve(blk_idx, blk_offset)?;
    let buf = table.slice_from(start)?;
    let mut cursor = Cursor::new(buf);

    let tag = cursor.read_u16()?;
    let id = InodeId::from_tag(tag)?;
    let header = read_header(&mut cursor)?;

    let (xattr_idx, body) = match id {
        InodeId::BasicDirectory => {
            let blk_idx = cursor.read_u32()?;
            let link_count = cursor.read_u32()?;
            let file_size = cursor.read_u16()? as u32;
            let blk_offset = cursor.read_u16()?;
            let parent_inode = cursor.read_u32()?;
            (
                NOT_SET_32,
                InodeBody::Directory(DirectoryInfo {
                    blk_idx,
                    blk_offset,
                    link_count,
                    file_size,
                    parent_inode,
                }),
            )
        }
        InodeId::ExtendedDirectory => {
            let link_count = cursor.read_u32()?;
            let file_size = cursor.read_u32()?;
            let blk_idx = cursor.read_u32()?;
            let parent_inode = cursor.read_u32()?;
            let _index_count = cursor.read_u16()?;
            let blk_offset = cursor.read_u16()?;
            let xattr_idx = cursor.read_u32()?;
            // The directory-index entries following this point speed up
            // large-directory lookups in the original format; readers that
            // walk the directory table directly (as this one does) have no
            // use for them and they are not parsed.
            (
                xattr_idx,
                InodeBody::Directory(DirectoryInfo {
                    blk_idx,
                    blk_offset,
                    link_count,
                    file_size,
                    parent_inode,
                }),
            )
        }
        InodeId::BasicFile => {
            let blocks_start = cursor.read_u32()? as u64;
            let frag_index = cursor.read_u32()?;
            let block_offset = cursor.read_u32()?;
            let file_size = cursor.read_u32()? as u64;
            let block_sizes = read_block_sizes(&mut cursor, block_size, frag_index, file_size)?;
            (
                NOT_SET_32,
                InodeBody::File(FileInfo {
                    blocks_start,
                    frag_index,
                    block_offset,
                    file_size,
                    block_sizes,
                }),
            )
        }
        InodeId::ExtendedFile => {
            let blocks_start = cursor.read_u64()?;
            let file_size = cursor.read_u64()?;
            let _sparse = cursor.read_u64()?;
            let _link_count = cursor.read_u32()?;
            let frag_index = cursor.read_u32()?;
            let block_offset = cursor.read_u32()?;
            let xattr_idx = cursor.read_u32()?;
            let block_sizes = read_block_sizes(&mut cursor, block_size, frag_index, file_size)?;
            (
                xattr_idx,
                InodeBody::File(FileInfo {
                    blocks_start,
                    frag_index,
                    block_offset,
                    file_size,
                    block_sizes,
                }),
            )
        }
        InodeId::BasicSymlink => {
            let link_count = cursor.read_u32()?;
            let target_size = cursor.read_u32()?;
            let target = cursor.read_bytes(target_size as usize)?.to_vec();
            (
                NOT_SET_32,
                InodeBody::Symlink { link_count, target },
            )
        }
        InodeId::ExtendedSymlink => {
            let link_count = cursor.read_u32()?;
            let target_size = cursor.read_u32()?;
            let target = cursor.read_bytes(target_size as usize)?.to_vec();
            let xattr_idx = cursor.read_u32()?;
            (xattr_idx, InodeBody::Symlink { link_count, target })
        }
        InodeId::BasicBlockDevice | InodeId::BasicCharDevice => {
            let link_count = cursor.read_u32()?;
            let device_number = cursor.read_u32()?;
            let dev = DeviceInfo {
                link_count,
                device_number,
            };
            let body = if id == InodeId::BasicBlockDevice {
                InodeBody::BlockDevice(dev)
            } else {
                InodeBody::CharDevice(dev)
            };
            (NOT_SET_32, body)
        }
        InodeId::ExtendedBlockDevice | InodeId::ExtendedCharDevice => {
            let link_count = cursor.read_u32()?;
            let device_number = cursor.read_u32()?;
            let xattr_idx = cursor.read_u32()?;
            let dev = DeviceInfo {
                link_count,
                device_number,
            };
            let body = if id == InodeId::ExtendedBlockDevice {
                InodeBody::BlockDevice(dev)
            } else {
                InodeBody::CharDevice(dev)
            };
            (xattr_idx, body)
        }
        InodeId::BasicFifo | InodeId::BasicSocket => {
            let link_count = cursor.read_u32()?;
            let ipc = IpcInfo { link_count };
            let body = if id == InodeId::BasicFifo {
                InodeBody::Fifo(ipc)
            } else {
                InodeBody::Socket(ipc)
            };
            (NOT_SET_32, body)
        }
        InodeId::ExtendedFifo | InodeId::ExtendedSocket => {
            let link_count = cursor.read_u32()?;
            let xattr_idx = cursor.read_u32()?;
            let ipc = IpcInfo { link_count };
            let body = if id == InodeId::ExtendedFifo {
                InodeBody::Fifo(ipc)
            } else {
                InodeBody::Socket(ipc)
            };
            (xattr_idx, body)
        }
    };

    Ok(Inode {
        header,
        xattr_idx,
        body,
    })
}
