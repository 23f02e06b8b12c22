//! Torrent metadata ([BEP-3]) and magnet links ([BEP-9]).
//!
//! A `.torrent` file is one bencoded dictionary:
//!
//! ```text
//! { announce: <url>,
//!   info: { length: <int>, name: <string>, "piece length": <int>, pieces: <20-byte digests> } }
//! ```
//!
//! The info hash is the SHA-1 of the canonical encoding of `info`. A magnet
//! link carries only the info hash, a name and a tracker; the info dictionary
//! itself is then fetched from a peer (see [`crate::peer`]) and parsed with
//! [`Info::from_bytes`].
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html
//! [BEP-9]: http://bittorrent.org/beps/bep_0009.html

mod error;
mod info_hash;
mod magnet;
mod torrent;

pub use error::MetainfoError;
pub use info_hash::InfoHash;
pub use magnet::MagnetLink;
pub use torrent::{Info, Metainfo, PIECE_HASH_LEN};
