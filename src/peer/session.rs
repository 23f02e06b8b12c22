use std::net::SocketAddr;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use super::error::PeerError;
use super::extension::{ExtensionHandshake, EXTENSION_HANDSHAKE_ID};
use super::message::{Handshake, Message};
use super::metadata::{MetadataBuffer, MetadataMessage};
use super::peer_id::PeerId;
use super::transport::PeerTransport;
use crate::config::ClientConfig;
use crate::constants::{LOCAL_UT_METADATA_ID, UT_METADATA};
use crate::metainfo::InfoHash;

/// Where a [`PeerSession`] is in its setup.
///
/// A session moves forward through
/// `Connecting → Handshaking → AwaitingBitfield → Idle → Interested → Unchoked`,
/// with `ExtensionHandshaking` entered from `Idle` while negotiating
/// extensions or fetching metadata. Any failed step leaves it in `Failed`.
///
/// Once interested, a `choke` from the peer moves `Unchoked` back to
/// `Interested` and an `unchoke` moves it forward again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Handshaking,
    AwaitingBitfield,
    ExtensionHandshaking,
    Idle,
    Interested,
    Unchoked,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChokingState {
    pub am_interested: bool,
    pub peer_choking: bool,
    pub peer_interested: bool,
}

impl Default for ChokingState {
    fn default() -> Self {
        Self {
            am_interested: false,
            peer_choking: true,
            peer_interested: false,
        }
    }
}

/// A download-side conversation with one peer.
///
/// Each setup step checks the current [`SessionState`] and refuses to run out
/// of order with [`PeerError::InvalidState`].
///
/// ```no_run
/// use minibit::metainfo::InfoHash;
/// use minibit::peer::{PeerId, PeerSession};
/// use minibit::ClientConfig;
///
/// # async fn example(info_hash: InfoHash) -> Result<(), minibit::peer::PeerError> {
/// let addr = "192.0.2.1:6881".parse().unwrap();
/// let config = ClientConfig::default();
/// let mut session = PeerSession::connect(addr, info_hash, PeerId::generate(), &config).await?;
///
/// session.handshake(false).await?;
/// session.receive_bitfield().await?;
/// session.express_interest().await?;
/// session.await_unchoke().await?;
/// # Ok(())
/// # }
/// ```
pub struct PeerSession<S> {
    transport: PeerTransport<S>,
    state: SessionState,
    info_hash: InfoHash,
    local_id: PeerId,
    remote_id: Option<PeerId>,
    remote_supports_extensions: bool,
    choking: ChokingState,
    bitfield: Option<Bytes>,
    pending_extension_handshake: Option<Bytes>,
    remote_extensions: Option<ExtensionHandshake>,
    max_metadata_size: u64,
}

impl PeerSession<TcpStream> {
    /// Opens a TCP connection to `addr`. The session starts in `Connecting`.
    pub async fn connect(
        addr: SocketAddr,
        info_hash: InfoHash,
        local_id: PeerId,
        config: &ClientConfig,
    ) -> Result<Self, PeerError> {
        debug!(%addr, "connecting to peer");
        let stream = timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| PeerError::Timeout)??;
        Ok(Self::new(stream, info_hash, local_id, config))
    }
}

impl<S> PeerSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, info_hash: InfoHash, local_id: PeerId, config: &ClientConfig) -> Self {
        Self {
            transport: PeerTransport::new(stream, config),
            state: SessionState::Connecting,
            info_hash,
            local_id,
            remote_id: None,
            remote_supports_extensions: false,
            choking: ChokingState::default(),
            bitfield: None,
            pending_extension_handshake: None,
            remote_extensions: None,
            max_metadata_size: config.max_metadata_size,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.local_id
    }

    /// The peer id from the remote handshake, once received.
    pub fn remote_peer_id(&self) -> Option<PeerId> {
        self.remote_id
    }

    pub fn supports_extension_protocol(&self) -> bool {
        self.remote_supports_extensions
    }

    /// The remote extension handshake, once exchanged.
    pub fn remote_extensions(&self) -> Option<&ExtensionHandshake> {
        self.remote_extensions.as_ref()
    }

    pub fn choking(&self) -> ChokingState {
        self.choking
    }

    pub fn is_choked(&self) -> bool {
        self.choking.peer_choking
    }

    /// The raw bitfield the peer sent, if any.
    pub fn bitfield(&self) -> Option<&Bytes> {
        self.bitfield.as_ref()
    }

    /// Sends our handshake and reads the peer's.
    ///
    /// `extensions` sets the extension-protocol bit; it should be set when the
    /// metadata still has to be fetched from this peer.
    pub async fn handshake(&mut self, extensions: bool) -> Result<PeerId, PeerError> {
        self.expect(SessionState::Connecting)?;
        let result = self.exchange_handshakes(extensions).await;
        self.settle(result)
    }

    /// Reads the peer's first message, normally its bitfield.
    ///
    /// Piece availability is not used; the bitfield is only kept for
    /// inspection. An extension handshake arriving first is held for
    /// [`extension_handshake`](Self::extension_handshake).
    pub async fn receive_bitfield(&mut self) -> Result<(), PeerError> {
        self.expect(SessionState::AwaitingBitfield)?;
        let result = self.next_message().await;
        let message = self.settle(result)?;

        match message {
            Message::Bitfield(bits) => trace!(len = bits.len(), "received bitfield"),
            Message::Extended {
                id: EXTENSION_HANDSHAKE_ID,
                payload,
            } => self.pending_extension_handshake = Some(payload),
            other => debug!(id = ?other.id(), "first message is not a bitfield"),
        }

        self.state = SessionState::Idle;
        Ok(())
    }

    /// Exchanges BEP-10 extension handshakes and returns the peer's
    /// `ut_metadata` message id.
    pub async fn extension_handshake(&mut self) -> Result<u8, PeerError> {
        self.expect(SessionState::Idle)?;

        if let Some(ref theirs) = self.remote_extensions {
            return theirs
                .extension_id(UT_METADATA)
                .ok_or(PeerError::ExtensionUnsupported(UT_METADATA));
        }

        if !self.remote_supports_extensions {
            return self.settle(Err(PeerError::ExtensionUnsupported("extension protocol")));
        }

        self.state = SessionState::ExtensionHandshaking;
        let result = self.exchange_extension_handshakes().await;
        let id = self.settle(result)?;
        self.state = SessionState::Idle;
        Ok(id)
    }

    /// Downloads the info dictionary over `ut_metadata` and checks it against
    /// the info hash. Runs the extension handshake first if needed.
    pub async fn fetch_metadata(&mut self) -> Result<Bytes, PeerError> {
        let remote_id = self.extension_handshake().await?;

        self.state = SessionState::ExtensionHandshaking;
        let result = self.request_metadata(remote_id).await;
        let raw = self.settle(result)?;
        self.state = SessionState::Idle;
        Ok(raw)
    }

    pub async fn express_interest(&mut self) -> Result<(), PeerError> {
        self.expect(SessionState::Idle)?;
        let result = self.transport.send_message(&Message::Interested).await;
        self.settle(result)?;

        self.choking.am_interested = true;
        self.state = SessionState::Interested;
        Ok(())
    }

    /// Reads messages until the peer unchokes us. Returns at once if it
    /// already has.
    pub async fn await_unchoke(&mut self) -> Result<(), PeerError> {
        self.expect(SessionState::Interested)?;
        let result = self.wait_for_unchoke().await;
        self.settle(result)?;

        self.state = SessionState::Unchoked;
        debug!("peer unchoked us");
        Ok(())
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), PeerError> {
        let result = self.transport.send_message(message).await;
        self.settle(result)
    }

    /// Returns the next message other than a keep-alive, after applying any
    /// choke state change it carries.
    pub async fn receive(&mut self) -> Result<Message, PeerError> {
        let result = self.next_message().await;
        self.settle(result)
    }

    async fn exchange_handshakes(&mut self, extensions: bool) -> Result<PeerId, PeerError> {
        let ours = Handshake::new(self.info_hash, self.local_id, extensions);
        self.transport.send_handshake(&ours).await?;
        self.state = SessionState::Handshaking;

        let theirs = self
            .transport
            .receive_handshake()
            .await
            .map_err(|err| match err {
                PeerError::ProtocolMismatch => {
                    PeerError::HandshakeRejected("unexpected protocol string".into())
                }
                other => other,
            })?;

        if theirs.info_hash != self.info_hash {
            return Err(PeerError::InfoHashMismatch);
        }

        self.remote_id = Some(theirs.peer_id);
        self.remote_supports_extensions = theirs.supports_extension_protocol();
        self.state = SessionState::AwaitingBitfield;

        debug!(
            peer_id = %theirs.peer_id,
            extensions = self.remote_supports_extensions,
            "handshake complete"
        );
        Ok(theirs.peer_id)
    }

    async fn exchange_extension_handshakes(&mut self) -> Result<u8, PeerError> {
        let ours = ExtensionHandshake::with_extensions(&[(UT_METADATA, LOCAL_UT_METADATA_ID)]);
        self.transport
            .send_message(&Message::Extended {
                id: EXTENSION_HANDSHAKE_ID,
                payload: ours.encode(),
            })
            .await?;

        let payload = match self.pending_extension_handshake.take() {
            Some(payload) => payload,
            None => loop {
                if let Message::Extended {
                    id: EXTENSION_HANDSHAKE_ID,
                    payload,
                } = self.next_message().await?
                {
                    break payload;
                }
            },
        };

        let theirs = ExtensionHandshake::decode(&payload)?;
        let id = theirs.extension_id(UT_METADATA);
        debug!(client = ?theirs.client, ut_metadata = ?id, "extension handshake complete");
        self.remote_extensions = Some(theirs);

        id.ok_or(PeerError::ExtensionUnsupported(UT_METADATA))
    }

    async fn request_metadata(&mut self, remote_id: u8) -> Result<Bytes, PeerError> {
        let announced = self
            .remote_extensions
            .as_ref()
            .and_then(|hs| hs.metadata_size);
        let mut buffer = MetadataBuffer::new(announced, self.max_metadata_size)?;

        while !buffer.is_complete() {
            let piece = buffer.next_piece();
            trace!(piece, "requesting metadata piece");
            self.transport
                .send_message(&Message::Extended {
                    id: remote_id,
                    payload: MetadataMessage::request(piece).encode(),
                })
                .await?;

            let payload = loop {
                if let Message::Extended {
                    id: LOCAL_UT_METADATA_ID,
                    payload,
                } = self.next_message().await?
                {
                    break payload;
                }
            };
            buffer.push(MetadataMessage::decode(&payload)?)?;
        }

        let raw = buffer.into_bytes();
        if InfoHash::of_info_bytes(&raw) != self.info_hash {
            return Err(PeerError::MetadataHashMismatch);
        }

        debug!(size = raw.len(), "metadata fetched");
        Ok(raw)
    }

    async fn wait_for_unchoke(&mut self) -> Result<(), PeerError> {
        while self.choking.peer_choking {
            self.next_message().await?;
        }
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Message, PeerError> {
        loop {
            let message = self.transport.receive_message().await?;
            if message != Message::KeepAlive {
                self.observe(&message);
                return Ok(message);
            }
        }
    }

    fn observe(&mut self, message: &Message) {
        match message {
            Message::Choke => {
                self.choking.peer_choking = true;
                if self.state == SessionState::Unchoked {
                    debug!("peer choked us");
                    self.state = SessionState::Interested;
                }
            }
            Message::Unchoke => {
                self.choking.peer_choking = false;
                if self.state == SessionState::Interested {
                    self.state = SessionState::Unchoked;
                }
            }
            Message::Interested => self.choking.peer_interested = true,
            Message::NotInterested => self.choking.peer_interested = false,
            Message::Bitfield(bits) => self.bitfield = Some(bits.clone()),
            Message::Unknown { id, .. } => trace!(id, "ignoring unknown message"),
            _ => {}
        }
    }

    fn expect(&self, expected: SessionState) -> Result<(), PeerError> {
        if self.state != expected {
            return Err(PeerError::InvalidState {
                expected,
                actual: self.state.clone(),
            });
        }
        Ok(())
    }

    fn settle<T>(&mut self, result: Result<T, PeerError>) -> Result<T, PeerError> {
        if let Err(ref err) = result {
            debug!(error = %err, state = ?self.state, "peer session failed");
            self.state = SessionState::Failed(err.to_string());
        }
        result
    }
}
