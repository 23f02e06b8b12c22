//! Peer wire protocol (BEP-3) with the extension protocol (BEP-10) and
//! metadata exchange (BEP-9).
//!
//! [`PeerTransport`] frames handshakes and messages over any async stream.
//! [`PeerSession`] drives one connection through the setup steps a download
//! needs: handshake, bitfield, optional metadata fetch, interest and unchoke.

mod error;
mod extension;
mod message;
mod metadata;
mod peer_id;
mod piece;
mod session;
mod transport;

pub use error::PeerError;
pub use extension::{ExtensionHandshake, EXTENSION_HANDSHAKE_ID};
pub use message::{Handshake, Message, MessageId, HANDSHAKE_LEN, PROTOCOL};
pub use metadata::{metadata_piece_count, MetadataMessage, MetadataMessageType};
pub use peer_id::PeerId;
pub use piece::{Block, BlockRequest};
pub use session::{ChokingState, PeerSession, SessionState};
pub use transport::PeerTransport;

#[cfg(test)]
pub(crate) mod mock;
