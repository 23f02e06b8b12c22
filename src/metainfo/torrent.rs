use super::error::MetainfoError;
use super::info_hash::InfoHash;
use super::magnet::MagnetLink;
use crate::bencode::{decode, encode, Value};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::path::Path;

/// Length of one SHA-1 piece digest inside `info.pieces`.
pub const PIECE_HASH_LEN: usize = 20;

/// A parsed single-file torrent.
///
/// # Examples
///
/// ```no_run
/// use minibit::metainfo::Metainfo;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let metainfo = Metainfo::from_file("sample.torrent")?;
///
/// println!("Tracker URL: {}", metainfo.announce);
/// println!("Info hash: {}", metainfo.info_hash);
/// println!("Pieces: {}", metainfo.info.piece_count());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Metainfo {
    /// Tracker announce URL.
    pub announce: String,
    /// SHA-1 of the canonically encoded info dictionary.
    pub info_hash: InfoHash,
    /// The info dictionary.
    pub info: Info,
    /// Unix timestamp when the torrent was created.
    pub creation_date: Option<i64>,
    /// Optional free-form comment.
    pub comment: Option<String>,
    /// Name/version of the program that created the torrent.
    pub created_by: Option<String>,
    raw_info: Bytes,
}

/// The info dictionary of a single-file torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    /// Suggested file name.
    pub name: String,
    /// Total file length in bytes.
    pub length: u64,
    /// Nominal piece length in bytes; only the last piece may be shorter.
    pub piece_length: u64,
    /// SHA-1 digest of each piece, in piece order.
    pub pieces: Vec<[u8; 20]>,
}

impl Metainfo {
    /// Parses a `.torrent` file.
    ///
    /// The info hash is computed over the re-encoded info dictionary, so it
    /// does not depend on the key order used by whoever wrote the file.
    ///
    /// # Errors
    ///
    /// Fails if the data is not bencode, the root is not a dictionary, or any of
    /// `announce`, `info.name`, `info.length`, `info.piece length`,
    /// `info.pieces` is missing or mistyped.
    pub fn from_bytes(data: &[u8]) -> Result<Self, MetainfoError> {
        let value = decode(data)?;
        let dict = value.as_dict().ok_or(MetainfoError::InvalidField("root"))?;

        let announce = require_str(dict, "announce")?.to_string();

        let info_value = dict
            .get(b"info".as_slice())
            .ok_or(MetainfoError::MissingField("info"))?;

        let raw_info = Bytes::from(encode(info_value));
        let info_hash = InfoHash::of_info_bytes(&raw_info);
        let info = Info::from_value(info_value)?;

        let creation_date = dict
            .get(b"creation date".as_slice())
            .and_then(|v| v.as_integer());

        let comment = dict
            .get(b"comment".as_slice())
            .and_then(|v| v.as_str())
            .map(String::from);

        let created_by = dict
            .get(b"created by".as_slice())
            .and_then(|v| v.as_str())
            .map(String::from);

        Ok(Self {
            announce,
            info_hash,
            info,
            creation_date,
            comment,
            created_by,
            raw_info,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MetainfoError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Completes a magnet link with an info dictionary fetched from a peer.
    ///
    /// The caller is expected to have checked that `raw_info` hashes to the
    /// magnet's info hash.
    pub fn from_magnet(magnet: &MagnetLink, raw_info: Bytes) -> Result<Self, MetainfoError> {
        let announce = magnet
            .tracker()
            .ok_or(MetainfoError::MissingField("tr"))?
            .to_string();
        let info = Info::from_bytes(&raw_info)?;

        Ok(Self {
            announce,
            info_hash: magnet.info_hash,
            info,
            creation_date: None,
            comment: None,
            created_by: None,
            raw_info,
        })
    }

    /// Returns the canonical bencoded info dictionary.
    pub fn raw_info(&self) -> &Bytes {
        &self.raw_info
    }
}

impl Info {
    /// Parses a bare bencoded info dictionary, as delivered by the
    /// `ut_metadata` extension.
    pub fn from_bytes(data: &[u8]) -> Result<Self, MetainfoError> {
        Self::from_value(&decode(data)?)
    }

    pub fn from_value(value: &Value) -> Result<Self, MetainfoError> {
        let dict = value.as_dict().ok_or(MetainfoError::InvalidField("info"))?;

        let name = require_str(dict, "name")?.to_string();

        let length = require_int(dict, "length")?;
        if length < 0 {
            return Err(MetainfoError::InvalidField("length"));
        }

        let piece_length = require_int(dict, "piece length")?;
        if piece_length <= 0 {
            return Err(MetainfoError::InvalidField("piece length"));
        }

        let pieces_bytes = dict
            .get(b"pieces".as_slice())
            .ok_or(MetainfoError::MissingField("pieces"))?
            .as_bytes()
            .ok_or(MetainfoError::InvalidField("pieces"))?;

        if pieces_bytes.len() % PIECE_HASH_LEN != 0 {
            return Err(MetainfoError::InvalidField("pieces"));
        }

        let pieces: Vec<[u8; 20]> = pieces_bytes
            .chunks_exact(PIECE_HASH_LEN)
            .map(|chunk| {
                let mut arr = [0u8; 20];
                arr.copy_from_slice(chunk);
                arr
            })
            .collect();

        let (length, piece_length) = (length as u64, piece_length as u64);
        if pieces.len() as u64 != length.div_ceil(piece_length) {
            return Err(MetainfoError::InvalidField("pieces"));
        }

        Ok(Info {
            name,
            length,
            piece_length,
            pieces,
        })
    }

    /// Number of pieces, `ceil(length / piece_length)`.
    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    /// Builds the bencode dictionary for the fields modelled here. Keys this
    /// type does not keep (such as `private`) are not reproduced, so only use
    /// the result for hashing when the dictionary was built locally.
    #[cfg(test)]
    pub(crate) fn to_value(&self) -> Value {
        let pieces: Vec<u8> = self.pieces.iter().flatten().copied().collect();
        Value::dict([
            ("length", Value::Integer(self.length as i64)),
            ("name", Value::string(&self.name)),
            ("piece length", Value::Integer(self.piece_length as i64)),
            ("pieces", Value::Bytes(Bytes::from(pieces))),
        ])
    }
}

fn require_str<'a>(
    dict: &'a BTreeMap<Bytes, Value>,
    key: &'static str,
) -> Result<&'a str, MetainfoError> {
    dict.get(key.as_bytes())
        .ok_or(MetainfoError::MissingField(key))?
        .as_str()
        .ok_or(MetainfoError::InvalidField(key))
}

fn require_int(dict: &BTreeMap<Bytes, Value>, key: &'static str) -> Result<i64, MetainfoError> {
    dict.get(key.as_bytes())
        .ok_or(MetainfoError::MissingField(key))?
        .as_integer()
        .ok_or(MetainfoError::InvalidField(key))
}
