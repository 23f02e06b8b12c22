//! A scripted remote peer on the far end of an in-memory duplex stream.

use bytes::Bytes;
use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

use super::extension::{ExtensionHandshake, EXTENSION_HANDSHAKE_ID};
use super::message::{Handshake, Message};
use super::metadata::{MetadataMessage, MetadataMessageType};
use super::peer_id::PeerId;
use super::piece::{Block, BlockRequest};
use super::session::PeerSession;
use super::transport::PeerTransport;
use crate::config::ClientConfig;
use crate::constants::{METADATA_PIECE_SIZE, UT_METADATA};
use crate::metainfo::InfoHash;

pub(crate) const LOCAL_PEER_ID: PeerId = PeerId([b'L'; 20]);
pub(crate) const REMOTE_PEER_ID: PeerId = PeerId([b'R'; 20]);

/// Extended id the mock asks the client to use for `ut_metadata`.
pub(crate) const MOCK_UT_METADATA_ID: u8 = 3;

pub(crate) struct MockPeer {
    transport: PeerTransport<DuplexStream>,
    info_hash: InfoHash,
    client_ut_metadata: Option<u8>,
}

pub(crate) fn connected(info_hash: InfoHash) -> (PeerSession<DuplexStream>, MockPeer) {
    connected_with(info_hash, &ClientConfig::default())
}

pub(crate) fn connected_with(
    info_hash: InfoHash,
    config: &ClientConfig,
) -> (PeerSession<DuplexStream>, MockPeer) {
    let (local, remote) = duplex(1 << 20);
    let session = PeerSession::new(local, info_hash, LOCAL_PEER_ID, config);
    let peer = MockPeer {
        transport: PeerTransport::new(remote, &ClientConfig::default()),
        info_hash,
        client_ut_metadata: None,
    };
    (session, peer)
}

impl MockPeer {
    /// Reads the client's handshake and answers with our own.
    pub async fn answer_handshake(&mut self, extensions: bool) -> Handshake {
        let theirs = self
            .transport
            .receive_handshake()
            .await
            .expect("client handshake");
        let ours = Handshake::new(self.info_hash, REMOTE_PEER_ID, extensions);
        self.transport.send_handshake(&ours).await.expect("send handshake");
        theirs
    }

    pub async fn write_raw(&mut self, data: &[u8]) {
        self.transport.get_mut().write_all(data).await.expect("write");
    }

    pub async fn send(&mut self, message: Message) {
        self.transport.send_message(&message).await.expect("send");
    }

    pub async fn recv(&mut self) -> Message {
        self.transport.receive_message().await.expect("receive")
    }

    /// Reads the client's extension handshake and answers, advertising
    /// `ut_metadata` under [`MOCK_UT_METADATA_ID`] when `with_metadata` is set.
    pub async fn answer_extension_handshake(
        &mut self,
        with_metadata: bool,
        metadata_size: Option<u64>,
    ) -> ExtensionHandshake {
        let theirs = match self.recv().await {
            Message::Extended {
                id: EXTENSION_HANDSHAKE_ID,
                payload,
            } => ExtensionHandshake::decode(&payload).expect("extension handshake"),
            other => panic!("expected extension handshake, got {:?}", other),
        };
        self.client_ut_metadata = theirs.extension_id(UT_METADATA);

        let mut ours = if with_metadata {
            ExtensionHandshake::with_extensions(&[(UT_METADATA, MOCK_UT_METADATA_ID)])
        } else {
            ExtensionHandshake::with_extensions(&[("ut_pex", 2)])
        };
        ours.client = Some("mock".into());
        ours.metadata_size = metadata_size;

        self.send(Message::Extended {
            id: EXTENSION_HANDSHAKE_ID,
            payload: ours.encode(),
        })
        .await;
        theirs
    }

    /// Answers one `ut_metadata` request per 16 KiB piece of `raw`.
    pub async fn serve_metadata(&mut self, raw: &[u8]) {
        let client_id = self.client_ut_metadata.expect("client ut_metadata id");
        for chunk in raw.chunks(METADATA_PIECE_SIZE) {
            let request = self.recv_metadata_request().await;
            self.send(Message::Extended {
                id: client_id,
                payload: MetadataMessage::data(
                    request.piece,
                    raw.len() as u64,
                    Bytes::copy_from_slice(chunk),
                )
                .encode(),
            })
            .await;
        }
    }

    pub async fn recv_metadata_request(&mut self) -> MetadataMessage {
        match self.recv().await {
            Message::Extended {
                id: MOCK_UT_METADATA_ID,
                payload,
            } => {
                let msg = MetadataMessage::decode(&payload).expect("metadata request");
                assert_eq!(msg.msg_type, MetadataMessageType::Request);
                msg
            }
            other => panic!("expected metadata request, got {:?}", other),
        }
    }

    pub async fn reject_metadata(&mut self) {
        let client_id = self.client_ut_metadata.expect("client ut_metadata id");
        let request = self.recv_metadata_request().await;
        self.send(Message::Extended {
            id: client_id,
            payload: MetadataMessage::reject(request.piece).encode(),
        })
        .await;
    }

    /// Runs the peer side of handshake, bitfield, interest and unchoke.
    pub async fn accept_download(&mut self, bitfield: &[u8]) {
        self.answer_handshake(false).await;
        self.send(Message::Bitfield(Bytes::copy_from_slice(bitfield)))
            .await;
        assert_eq!(self.recv().await, Message::Interested);
        self.send(Message::Unchoke).await;
    }

    /// Serves the next `count` block requests from `content`, which is laid
    /// out in pieces of `piece_length` bytes. Returns the requests seen.
    pub async fn serve_blocks(
        &mut self,
        content: &[u8],
        piece_length: u64,
        count: usize,
    ) -> Vec<BlockRequest> {
        let mut seen = Vec::with_capacity(count);
        for _ in 0..count {
            let request = self.recv_request().await;
            self.send(Message::Piece(block_for(content, piece_length, &request)))
                .await;
            seen.push(request);
        }
        seen
    }

    pub async fn recv_request(&mut self) -> BlockRequest {
        loop {
            match self.recv().await {
                Message::Request(request) => return request,
                Message::KeepAlive => continue,
                other => panic!("expected request, got {:?}", other),
            }
        }
    }
}

pub(crate) fn block_for(content: &[u8], piece_length: u64, request: &BlockRequest) -> Block {
    let start = (u64::from(request.piece) * piece_length + u64::from(request.offset)) as usize;
    let end = start + request.length as usize;
    Block::new(
        request.piece,
        request.offset,
        Bytes::copy_from_slice(&content[start..end]),
    )
}
