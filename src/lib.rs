//! minibit - a minimal BitTorrent leecher
//!
//! Enough of the BitTorrent protocol to fetch a single-file torrent from one
//! peer, starting from either a `.torrent` file or a magnet link.
//!
//! # Modules
//!
//! - [`bencode`] - BEP-3 Bencode encoding/decoding
//! - [`metainfo`] - BEP-3 torrent metainfo, BEP-9 magnet links
//! - [`tracker`] - BEP-3/23 HTTP tracker announces
//! - [`peer`] - BEP-3 peer wire protocol, BEP-10 extension protocol, BEP-9 metadata exchange
//! - [`download`] - Block-by-block piece transfer with SHA-1 verification
//! - [`storage`] - Destinations for verified pieces
//! - [`client`] - Tracker, session and downloader composed into one client

pub mod bencode;
pub mod client;
pub mod config;
pub mod constants;
pub mod download;
pub mod metainfo;
pub mod peer;
pub mod storage;
pub mod tracker;

pub use bencode::{decode, encode, BencodeError, Value};
pub use client::{Client, ClientError, MetadataSource};
pub use config::ClientConfig;
pub use download::{DownloadError, Downloader, PieceLayout};
pub use metainfo::{Info, InfoHash, MagnetLink, Metainfo, MetainfoError};
pub use peer::{
    Block, BlockRequest, ExtensionHandshake, Handshake, Message, PeerError, PeerId, PeerSession,
    SessionState,
};
pub use storage::{FileSink, MemorySink, PieceSink, StorageError};
pub use tracker::{AnnounceResponse, HttpTracker, TrackerError};
