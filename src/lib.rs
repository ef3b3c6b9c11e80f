//! A read-only reader for [SquashFS](https://en.wikipedia.org/wiki/SquashFS)
//! 4.0 file system images: compressed, read-only images commonly used for
//! live OS images, embedded firmware, and application bundles.
//!
//! ### Reading
//! Wrap a byte source (a memory-mapped file, or any `AsRef<[u8]>`) with
//! [`Image::open`], then query it with [`Image::stat`], [`Image::listdir`],
//! and [`Image::open_file`].
//!
//!```rust,no_run
//! # use squashfs_reader::Image;
//! let bytes = std::fs::read("image.squashfs").unwrap();
//! let image = Image::open(bytes).unwrap();
//!
//! for name in image.listdir("/").unwrap() {
//!     println!("{}", String::from_utf8_lossy(&name));
//! }
//!
//! let info = image.stat("/etc/hostname").unwrap();
//! if info.is_file() {
//!     let contents = image.open_file("/etc/hostname").unwrap();
//!     println!("{} bytes", contents.len());
//! }
//! ```
//!
//! Only the zlib compressor is supported; images built with any other
//! compressor are rejected at open time with [`SquashfsError::UnsupportedImage`].
//! Writing, image creation, and repair are out of scope: this is a reader
//! only.

mod compressor;
mod data;
mod dir;
mod error;
mod fragment;
mod id;
mod image;
mod inode;
mod metadata;
mod reader;
mod superblock;
mod xattr;

pub use crate::error::SquashfsError;
pub use crate::image::{FileInfo, Image};
pub use crate::reader::ByteSource;
pub use crate::superblock::SuperBlock;
pub use crate::xattr::XattrMap;
