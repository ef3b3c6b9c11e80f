//! Compression identifiers from the superblock
//!
//! The on-disk format supports six compressor ids; this reader implements
//! decompression for zlib only, per the core specification. Other ids parse
//! successfully (the superblock is otherwise well-formed) but are rejected as
//! [`SquashfsError::UnsupportedImage`] the moment decompression is attempted.

use std::io::Read;

use deku::prelude::*;
use flate2::read::ZlibDecoder;
use tracing::instrument;

use crate::error::SquashfsError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, DekuRead)]
#[deku(endian = "little", type = "u16")]
#[rustfmt::skip]
pub enum Compressor {
    None = 0,
    Gzip = 1,
    Lzma = 2,
    Lzo  = 3,
    Xz   = 4,
    Lz4  = 5,
    Zstd = 6,
}

impl Compressor {
    pub(crate) fn from_id(id: u16) -> Result<Self, SquashfsError> {
        match id {
            0 => Ok(Self::None),
            1 => Ok(Self::Gzip),
            2 => Ok(Self::Lzma),
            3 => Ok(Self::Lzo),
            4 => Ok(Self::Xz),
            5 => Ok(Self::Lz4),
            6 => Ok(Self::Zstd),
            _ => Err(SquashfsError::UnsupportedImage("unknown compression id")),
        }
    }
}

/// Decompress `bytes` (the payload of one metadata or data block) using the
/// image's compressor.
#[instrument(skip_all)]
pub(crate) fn decompress(bytes: &[u8], compressor: Compressor) -> Result<Vec<u8>, SquashfsError> {
    match compressor {
        Compressor::Gzip => {
            let mut decoder = ZlibDecoder::new(bytes);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|_| SquashfsError::CorruptImage("zlib decompression failed"))?;
            Ok(out)
        }
        _ => Err(SquashfsError::UnsupportedImage(
            "only zlib (gzip) compression is supported",
        )),
    }
}
