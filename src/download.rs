//! Piece transfer over an unchoked [`PeerSession`](crate::peer::PeerSession).
//!
//! A file of `length` bytes is split into pieces of `piece length` bytes
//! (the last one may be shorter) and each piece into 16 KiB blocks. Blocks
//! are requested one at a time in ascending offset order; a complete piece is
//! hashed and compared with its digest from the metainfo before it is handed
//! to a [`PieceSink`](crate::storage::PieceSink). Pieces are fetched and
//! written in ascending index order.

mod buffer;
mod engine;
mod error;
mod layout;

pub use buffer::PieceBuffer;
pub use engine::Downloader;
pub use error::DownloadError;
pub use layout::PieceLayout;

#[cfg(test)]
mod tests;
