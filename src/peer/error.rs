use thiserror::Error;

use super::session::SessionState;

/// Errors that can occur during peer communication.
#[derive(Debug, Error)]
pub enum PeerError {
    /// Network I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed by the peer.
    #[error("connection closed")]
    ConnectionClosed,

    /// Operation timed out.
    #[error("timeout")]
    Timeout,

    /// The handshake preamble is not `\x13BitTorrent protocol`.
    #[error("protocol mismatch in handshake")]
    ProtocolMismatch,

    /// The peer's handshake was not acceptable.
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    /// The peer's info hash doesn't match ours.
    #[error("info hash mismatch")]
    InfoHashMismatch,

    /// Received a malformed protocol message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The peer does not support an extension we need.
    #[error("extension unsupported: {0}")]
    ExtensionUnsupported(&'static str),

    /// The peer rejected a `ut_metadata` piece request.
    #[error("metadata piece {0} rejected")]
    MetadataRejected(u32),

    /// The metadata received does not hash to the info hash.
    #[error("metadata does not match info hash")]
    MetadataHashMismatch,

    /// A session step was called out of order.
    #[error("invalid session state: expected {expected:?}, was {actual:?}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },

    /// Error decoding bencode in extension messages.
    #[error("bencode error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),
}

impl PeerError {
    /// Returns true for failures of the underlying connection rather than of
    /// the protocol exchanged over it.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            PeerError::Io(_) | PeerError::ConnectionClosed | PeerError::Timeout
        )
    }
}
