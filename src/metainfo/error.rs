use thiserror::Error;

use crate::bencode::BencodeError;

/// Errors that can occur when parsing torrent metadata or magnet links.
#[derive(Debug, Error)]
pub enum MetainfoError {
    /// The metadata is not valid bencode.
    #[error("bencode error: {0}")]
    Bencode(#[from] BencodeError),

    /// A required field is missing.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field has the wrong type or an out-of-range value.
    #[error("invalid field: {0}")]
    InvalidField(&'static str),

    /// The info hash is not 20 bytes (40 hex characters).
    #[error("invalid info hash length")]
    InvalidInfoHashLength,

    /// The magnet link is malformed.
    #[error("invalid magnet link: {0}")]
    InvalidMagnetLink(String),

    /// Reading the torrent file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
