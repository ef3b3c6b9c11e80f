//! Image façade: opens an image, materialises its tables once, and answers
//! path queries against them.
//!
//! Everything up through table construction happens in [`Image::open`]; every
//! other public method is a pure in-memory lookup except [`Image::open_file`],
//! which additionally walks the byte source to decompress file data on
//! demand.

use crate::compressor::Compressor;
use crate::data;
use crate::dir::{self, DirEntry};
use crate::error::SquashfsError;
use crate::fragment::{self, Fragment};
use crate::id;
use crate::inode::{self, Inode};
use crate::metadata::{self, split_ref, Table};
use crate::reader::ByteSource;
use crate::superblock::{SuperBlock, SUPERBLOCK_SIZE};
use crate::xattr::{self, XattrMap};
use tracing::{error, info, instrument};

/// A materialised, queryable view of a SquashFS 4.0 image.
///
/// Constructed once via [`Image::open`]; thereafter immutable. Multiple
/// readers may call `stat`/`listdir`/`open_file` concurrently provided the
/// underlying [`ByteSource`] permits concurrent reads (a memory map does).
pub struct Image {
    source: Box<dyn ByteSource>,
    superblock: SuperBlock,
    ids: Vec<u32>,
    inode_table: Table,
    dir_table: Table,
    fragments: Option<Vec<Fragment>>,
    xattrs: Option<Vec<XattrMap>>,
    root_inode: Inode,
}

/// A `stat`-like snapshot of one path's metadata.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub size: u64,
    /// 12-bit permission bits (no type bits).
    pub permissions: u16,
    pub uid: u32,
    pub gid: u32,
    pub modified_time: u32,
    /// Ordered `name -> value` extended attributes; empty when the inode has
    /// none or the image carries no xattr table.
    pub xattrs: XattrMap,
    is_dir: bool,
    is_file: bool,
    is_symlink: bool,
    is_block_dev: bool,
    is_char_dev: bool,
    is_fifo: bool,
    is_socket: bool,
}

impl FileInfo {
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn is_file(&self) -> bool {
        self.is_file
    }

    pub fn is_symlink(&self) -> bool {
        self.is_symlink
    }

    pub fn is_block_dev(&self) -> bool {
        self.is_block_dev
    }

    pub fn is_char_dev(&self) -> bool {
        self.is_char_dev
    }

    pub fn is_fifo(&self) -> bool {
        self.is_fifo
    }

    pub fn is_socket(&self) -> bool {
        self.is_socket
    }
}

const PERMISSION_MASK: u16 = 0o7777;

/// Split a `/`-separated byte path into its non-empty components. Leading and
/// repeated `/` are ignored; `.` and `..` are not special and are matched as
/// ordinary names.
fn split_path(path: &str) -> impl Iterator<Item = &[u8]> {
    path.as_bytes()
        .split(|&b| b == b'/')
        .filter(|c| !c.is_empty())
}

impl Image {
    /// Open an image: parse the superblock, materialise the id, inode, and
    /// directory tables, conditionally load the fragment and xattr tables,
    /// and resolve the root inode.
    #[instrument(skip_all)]
    pub fn open<S: ByteSource + 'static>(source: S) -> Result<Self, SquashfsError> {
        let mut header = [0u8; SUPERBLOCK_SIZE];
        source.read_at(0, &mut header)?;
        let superblock = SuperBlock::parse(&header)?;
        let compressor = superblock.compressor();
        info!("compressor: {compressor:?}");

        let ids = id::load(
            &source,
            compressor,
            superblock.id_table_start,
            superblock.id_count,
        )?;

        let inode_table = metadata::load_table(
            &source,
            compressor,
            superblock.inode_table_start,
            superblock.directory_table_start,
        )?;
        let dir_table = metadata::load_table(
            &source,
            compressor,
            superblock.directory_table_start,
            superblock.fragment_table_start,
        )?;

        let fragments = fragment::load(
            &source,
            compressor,
            superblock.fragment_table_start,
            superblock.frag_count,
            superblock.no_fragments(),
        )?;

        let xattrs = xattr::load(
            &source,
            compressor,
            superblock.xattr_id_table_start,
            superblock.no_xattrs(),
        )?;

        let (root_block, root_offset) = split_ref(superblock.root_inode_ref);
        let root_inode = inode::read_inode(
            &inode_table,
            superblock.block_size,
            root_block,
            root_offset,
        )?;
        if !root_inode.is_dir() {
            error!("root inode is not a directory");
            return Err(SquashfsError::CorruptImage("root inode is not a directory"));
        }

        Ok(Self {
            source: Box::new(source),
            superblock,
            ids,
            inode_table,
            dir_table,
            fragments,
            xattrs,
            root_inode,
        })
    }

    fn id_at(&self, idx: u16) -> Result<u32, SquashfsError> {
        self.ids
            .get(idx as usize)
            .copied()
            .ok_or(SquashfsError::CorruptImage("id index out of range"))
    }

    fn entries_of(&self, inode: &Inode) -> Result<Vec<DirEntry>, SquashfsError> {
        let d = inode
            .directory_info()
            .ok_or(SquashfsError::NotADirectory)?;
        dir::read_entries(&self.dir_table, d.blk_idx as u64, d.blk_offset as usize, d.file_size)
    }

    /// Resolve `path` to its inode, starting from the root and scanning each
    /// directory's entries linearly for a byte-exact name match.
    fn resolve(&self, path: &str) -> Result<Inode, SquashfsError> {
        let mut current = self.root_inode.clone();
        for component in split_path(path) {
            let entries = self.entries_of(&current)?;
            let entry = entries
                .iter()
                .find(|e| e.name == component)
                .ok_or(SquashfsError::PathNotFound)?;
            current = inode::read_inode(
                &self.inode_table,
                self.superblock.block_size,
                entry.child_block,
                entry.child_offset,
            )?;
        }
        Ok(current)
    }

    fn xattrs_for(&self, inode: &Inode) -> Result<XattrMap, SquashfsError> {
        match (inode.xattr_idx(), &self.xattrs) {
            (Some(idx), Some(table)) => table
                .get(idx as usize)
                .cloned()
                .ok_or(SquashfsError::CorruptImage("xattr index out of range")),
            _ => Ok(Vec::new()),
        }
    }

    fn file_info(&self, inode: &Inode) -> Result<FileInfo, SquashfsError> {
        let xattrs = self.xattrs_for(inode)?;
        Ok(FileInfo {
            size: inode.size(),
            permissions: inode.header.permissions & PERMISSION_MASK,
            uid: self.id_at(inode.header.uid_idx)?,
            gid: self.id_at(inode.header.gid_idx)?,
            modified_time: inode.header.modified_time,
            xattrs,
            is_dir: inode.is_dir(),
            is_file: inode.is_file(),
            is_symlink: inode.is_symlink(),
            is_block_dev: inode.is_block_dev(),
            is_char_dev: inode.is_char_dev(),
            is_fifo: inode.is_fifo(),
            is_socket: inode.is_socket(),
        })
    }

    /// Look up metadata for `path`. The target may be of any inode type.
    pub fn stat(&self, path: &str) -> Result<FileInfo, SquashfsError> {
        let inode = self.resolve(path)?;
        self.file_info(&inode)
    }

    /// List the names of `path`'s children in stored order. Fails with
    /// [`SquashfsError::NotADirectory`] if the target is not a directory.
    pub fn listdir(&self, path: &str) -> Result<Vec<Vec<u8>>, SquashfsError> {
        let inode = self.resolve(path)?;
        let entries = self.entries_of(&inode)?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }

    /// Read and concatenate `path`'s file contents, including its fragment
    /// tail if any. Fails with [`SquashfsError::NotAFile`] if the target is
    /// not a file.
    pub fn open_file(&self, path: &str) -> Result<Vec<u8>, SquashfsError> {
        let inode = self.resolve(path)?;
        let file = inode.file_info().ok_or(SquashfsError::NotAFile)?;
        data::read_file(
            self.source.as_ref(),
            self.superblock.compressor(),
            self.superblock.block_size,
            file.blocks_start,
            &file.block_sizes,
            file.frag_index,
            file.block_offset,
            file.file_size,
            self.fragments.as_deref(),
        )
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }
}
