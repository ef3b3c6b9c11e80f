//! Errors returned while opening or querying a SquashFS image

use std::io;

use thiserror::Error;

/// Errors generated while reading a SquashFS image
#[derive(Error, Debug)]
pub enum SquashfsError {
    #[error("std io error: {0}")]
    StdIo(#[from] io::Error),

    #[error("deku error: {0:?}")]
    Deku(#[from] deku::DekuError),

    #[error("string error: {0:?}")]
    StringUtf8(#[from] std::string::FromUtf8Error),

    #[error("corrupted or invalid squashfs image: {0}")]
    CorruptImage(&'static str),

    #[error("unsupported squashfs image: {0}")]
    UnsupportedImage(&'static str),

    #[error("path not found")]
    PathNotFound,

    #[error("not a directory")]
    NotADirectory,

    #[error("not a file")]
    NotAFile,
}

impl From<SquashfsError> for io::Error {
    fn from(value: SquashfsError) -> Self {
        use SquashfsError::*;
        match value {
            StdIo(io) => io,
            Deku(e) => Self::new(io::ErrorKind::InvalidData, e),
            StringUtf8(e) => Self::new(io::ErrorKind::InvalidData, e),
            e @ CorruptImage(_) => Self::new(io::ErrorKind::InvalidData, e),
            e @ UnsupportedImage(_) => Self::new(io::ErrorKind::Unsupported, e),
            e @ PathNotFound => Self::new(io::ErrorKind::NotFound, e),
            e @ (NotADirectory | NotAFile) => Self::new(io::ErrorKind::InvalidData, e),
        }
    }
}
