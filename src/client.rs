//! High-level client that ties the tracker, peer session and downloader
//! together.
//!
//! A [`Client`] owns its configuration and a peer id for its lifetime. Each
//! torrent is described by a [`MetadataSource`]: either a parsed `.torrent`
//! file, or a magnet link whose info dictionary is fetched from the first
//! peer that serves it.
//!
//! ```no_run
//! use minibit::client::{Client, MetadataSource};
//! use minibit::metainfo::Metainfo;
//! use minibit::ClientConfig;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new(ClientConfig::default());
//! let source = MetadataSource::Torrent(Metainfo::from_file("sample.torrent")?);
//!
//! let (mut session, metainfo) = client.connect(&source).await?;
//! let written = client
//!     .download_file(&mut session, &metainfo.info, "sample.bin")
//!     .await?;
//! println!("{} bytes", written);
//! # Ok(())
//! # }
//! ```

mod error;

pub use error::ClientError;

use std::net::SocketAddr;
use std::path::Path;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::download::Downloader;
use crate::metainfo::{Info, InfoHash, MagnetLink, Metainfo};
use crate::peer::{PeerId, PeerSession, SessionState};
use crate::storage::FileSink;
use crate::tracker::HttpTracker;

/// `left` reported when announcing a magnet link, whose length is not yet
/// known. Some trackers refuse a zero.
pub const MAGNET_ANNOUNCE_LEFT: u64 = 1;

/// Where the info dictionary of a torrent comes from.
#[derive(Debug, Clone)]
pub enum MetadataSource {
    /// A `.torrent` file; the metadata is already known.
    Torrent(Metainfo),
    /// A magnet link; the metadata is fetched over `ut_metadata`.
    Magnet(MagnetLink),
}

impl MetadataSource {
    pub fn info_hash(&self) -> InfoHash {
        match self {
            MetadataSource::Torrent(metainfo) => metainfo.info_hash,
            MetadataSource::Magnet(magnet) => magnet.info_hash,
        }
    }

    pub fn tracker(&self) -> Option<&str> {
        match self {
            MetadataSource::Torrent(metainfo) => Some(&metainfo.announce),
            MetadataSource::Magnet(magnet) => magnet.tracker(),
        }
    }

    /// Whether the info dictionary still has to be fetched from a peer.
    pub fn needs_metadata(&self) -> bool {
        matches!(self, MetadataSource::Magnet(_))
    }

    fn left(&self) -> u64 {
        match self {
            MetadataSource::Torrent(metainfo) => metainfo.info.length,
            MetadataSource::Magnet(_) => MAGNET_ANNOUNCE_LEFT,
        }
    }
}

/// A leech-only client with a fixed peer id.
#[derive(Debug, Clone)]
pub struct Client {
    config: ClientConfig,
    peer_id: PeerId,
}

impl Client {
    /// Creates a client with a fresh random peer id.
    pub fn new(config: ClientConfig) -> Self {
        let peer_id = PeerId::with_prefix(&config.peer_id_prefix, &mut rand::rng());
        Self::with_peer_id(config, peer_id)
    }

    pub fn with_peer_id(config: ClientConfig, peer_id: PeerId) -> Self {
        Self { config, peer_id }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Announces to the source's tracker and returns the peers it lists.
    pub async fn announce(&self, source: &MetadataSource) -> Result<Vec<SocketAddr>, ClientError> {
        let url = source.tracker().ok_or(ClientError::NoTracker)?;
        let tracker = HttpTracker::with_timeout(url, self.config.tracker_timeout)?;
        let response = tracker
            .announce(
                &source.info_hash(),
                &self.peer_id,
                self.config.port,
                0,
                0,
                source.left(),
            )
            .await?;

        info!(
            tracker = url,
            peers = response.peers.len(),
            interval = ?response.interval,
            "announced"
        );
        if let Some(warning) = &response.warning_message {
            warn!(tracker = url, warning = %warning, "tracker warning");
        }
        Ok(response.peers)
    }

    /// Opens a TCP connection to `addr`. No bytes are exchanged yet.
    pub async fn dial(
        &self,
        addr: SocketAddr,
        info_hash: InfoHash,
    ) -> Result<PeerSession<TcpStream>, ClientError> {
        Ok(PeerSession::connect(addr, info_hash, self.peer_id, &self.config).await?)
    }

    /// Runs the handshake and bitfield steps, plus the extension handshake
    /// when the metadata must be fetched.
    pub async fn negotiate<S>(
        &self,
        session: &mut PeerSession<S>,
        source: &MetadataSource,
    ) -> Result<PeerId, ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let extensions = source.needs_metadata();
        let remote = session.handshake(extensions).await?;
        session.receive_bitfield().await?;
        if extensions {
            let id = session.extension_handshake().await?;
            debug!(peer = %remote, ut_metadata = id, "peer serves metadata");
        }
        Ok(remote)
    }

    /// Returns the full metainfo for `source`, fetching the info dictionary
    /// from the peer for a magnet link.
    pub async fn resolve_metainfo<S>(
        &self,
        session: &mut PeerSession<S>,
        source: &MetadataSource,
    ) -> Result<Metainfo, ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match source {
            MetadataSource::Torrent(metainfo) => Ok(metainfo.clone()),
            MetadataSource::Magnet(magnet) => {
                let raw_info = session.fetch_metadata().await?;
                let metainfo = Metainfo::from_magnet(magnet, raw_info)?;
                info!(
                    info_hash = %metainfo.info_hash,
                    name = %metainfo.info.name,
                    length = metainfo.info.length,
                    metadata_len = metainfo.raw_info().len(),
                    "fetched metadata"
                );
                Ok(metainfo)
            }
        }
    }

    /// Connects to one peer and brings the session up to `Idle` with the
    /// metadata in hand.
    pub async fn open_session(
        &self,
        addr: SocketAddr,
        source: &MetadataSource,
    ) -> Result<(PeerSession<TcpStream>, Metainfo), ClientError> {
        let mut session = self.dial(addr, source.info_hash()).await?;
        self.negotiate(&mut session, source).await?;
        let metainfo = self.resolve_metainfo(&mut session, source).await?;
        Ok((session, metainfo))
    }

    /// Announces, then tries the returned peers in order until one session
    /// opens.
    pub async fn connect(
        &self,
        source: &MetadataSource,
    ) -> Result<(PeerSession<TcpStream>, Metainfo), ClientError> {
        let peers = self.announce(source).await?;
        let mut last_error = None;

        for addr in peers {
            match self.open_session(addr, source).await {
                Ok(opened) => {
                    info!(%addr, "session open");
                    return Ok(opened);
                }
                Err(e) => {
                    warn!(
                        %addr,
                        error = %e,
                        transport = e.is_transport(),
                        "peer failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(ClientError::NoPeers))
    }

    /// Downloads and verifies one piece, expressing interest first if the
    /// session is still idle.
    pub async fn download_piece<S>(
        &self,
        session: &mut PeerSession<S>,
        info: &Info,
        index: u32,
    ) -> Result<Bytes, ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        prepare(session).await?;
        Ok(Downloader::new(session, info).download_piece(index).await?)
    }

    /// Downloads every piece into a file at `path`. Returns the bytes written.
    pub async fn download_file<S>(
        &self,
        session: &mut PeerSession<S>,
        info: &Info,
        path: impl AsRef<Path>,
    ) -> Result<u64, ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        prepare(session).await?;
        let mut sink = FileSink::create(path, info.piece_length, info.length).await?;
        Ok(Downloader::new(session, info).download_all(&mut sink).await?)
    }
}

async fn prepare<S>(session: &mut PeerSession<S>) -> Result<(), ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if session.state() == &SessionState::Idle {
        session.express_interest().await?;
    }
    if session.state() == &SessionState::Interested {
        session.await_unchoke().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests;
