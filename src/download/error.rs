use thiserror::Error;

use crate::peer::{PeerError, SessionState};
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// The assembled piece does not hash to its digest.
    #[error("piece {piece} failed verification: expected {expected}, got {actual}")]
    PieceIntegrity {
        piece: u32,
        expected: String,
        actual: String,
    },

    #[error("unexpected block: piece {piece}, offset {offset}, {length} bytes")]
    UnexpectedBlock { piece: u32, offset: u32, length: u32 },

    #[error("invalid piece index: {0}")]
    InvalidPieceIndex(u32),

    /// Blocks can only be requested once the peer has unchoked us.
    #[error("session not ready for transfer: {0:?}")]
    NotReady(SessionState),

    #[error("peer error: {0}")]
    Peer(#[from] PeerError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
