use thiserror::Error;

use crate::download::DownloadError;
use crate::metainfo::MetainfoError;
use crate::peer::PeerError;
use crate::storage::StorageError;
use crate::tracker::TrackerError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("peer error: {0}")]
    Peer(#[from] PeerError),

    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("metainfo error: {0}")]
    Metainfo(#[from] MetainfoError),

    /// The magnet link names no tracker to announce to.
    #[error("no tracker to announce to")]
    NoTracker,

    /// The tracker returned no usable peers.
    #[error("tracker returned no peers")]
    NoPeers,
}

impl ClientError {
    /// True when the peer could not be reached or dropped the connection,
    /// as opposed to speaking the protocol wrongly.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Peer(e) if e.is_transport())
    }
}
