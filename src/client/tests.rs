use super::*;
use crate::bencode::encode;
use crate::peer::mock::{self, REMOTE_PEER_ID};
use crate::peer::{Handshake, Message, PeerError, PeerTransport};
use sha1::{Digest, Sha1};
use std::net::SocketAddr;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const TRACKER: &str = "http://tracker.test/announce";

fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 13 % 251) as u8).collect()
}

fn info_for(content: &[u8], piece_length: u64) -> Info {
    Info {
        name: "content.bin".into(),
        length: content.len() as u64,
        piece_length,
        pieces: content
            .chunks(piece_length as usize)
            .map(|chunk| Sha1::digest(chunk).into())
            .collect(),
    }
}

fn torrent_for(announce: &str, info: &Info) -> Metainfo {
    let root = crate::bencode::Value::dict([
        ("announce", crate::bencode::Value::string(announce)),
        ("info", info.to_value()),
    ]);
    Metainfo::from_bytes(&encode(&root)).unwrap()
}

fn magnet_for(info_hash: InfoHash, trackers: &[&str]) -> MagnetLink {
    MagnetLink {
        info_hash,
        display_name: None,
        trackers: trackers.iter().map(|t| t.to_string()).collect(),
    }
}

/// Serves a single HTTP response carrying `body` and returns the request
/// line and headers it received.
async fn serve_tracker(body: Vec<u8>) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/announce", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.ends_with(b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0);
            request.extend_from_slice(&buf[..n]);
        }

        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body).await.unwrap();
        String::from_utf8_lossy(&request).into_owned()
    });

    (url, server)
}

fn compact_peers_body(peers: &[SocketAddr]) -> Vec<u8> {
    let mut compact = Vec::new();
    for peer in peers {
        match peer {
            SocketAddr::V4(v4) => {
                compact.extend_from_slice(&v4.ip().octets());
                compact.extend_from_slice(&v4.port().to_be_bytes());
            }
            SocketAddr::V6(_) => unreachable!(),
        }
    }
    let mut body = format!("d8:intervali60e5:peers{}:", compact.len()).into_bytes();
    body.extend_from_slice(&compact);
    body.push(b'e');
    body
}

#[test]
fn test_peer_id_uses_configured_prefix() {
    let config = ClientConfig::default().with_peer_id_prefix(b"-XX0042-".to_vec());
    let client = Client::new(config);
    assert_eq!(&client.peer_id().as_bytes()[..8], b"-XX0042-");
    assert_eq!(client.peer_id().client_id(), Some("XX0042"));
}

#[test]
fn test_metadata_source_accessors() {
    let info = info_for(&content(100), 64);
    let torrent = MetadataSource::Torrent(torrent_for(TRACKER, &info));
    assert!(!torrent.needs_metadata());
    assert_eq!(torrent.tracker(), Some(TRACKER));
    assert_eq!(torrent.left(), 100);

    let magnet = MetadataSource::Magnet(magnet_for(InfoHash([0x44; 20]), &[]));
    assert!(magnet.needs_metadata());
    assert_eq!(magnet.info_hash(), InfoHash([0x44; 20]));
    assert_eq!(magnet.tracker(), None);
    assert_eq!(magnet.left(), MAGNET_ANNOUNCE_LEFT);
}

#[test]
fn test_error_is_transport() {
    assert!(ClientError::from(PeerError::Timeout).is_transport());
    assert!(ClientError::from(PeerError::ConnectionClosed).is_transport());
    assert!(!ClientError::from(PeerError::InfoHashMismatch).is_transport());
    assert!(!ClientError::NoPeers.is_transport());
}

#[tokio::test]
async fn test_negotiate_torrent_skips_extensions() {
    let info = info_for(&content(100), 64);
    let source = MetadataSource::Torrent(torrent_for(TRACKER, &info));
    let client = Client::new(ClientConfig::default());
    let (mut session, mut peer) = mock::connected(source.info_hash());

    let (remote, theirs) = tokio::join!(client.negotiate(&mut session, &source), async {
        let theirs = peer.answer_handshake(true).await;
        peer.send(Message::Bitfield(Bytes::from_static(&[0xC0])))
            .await;
        theirs
    });

    assert_eq!(remote.unwrap(), REMOTE_PEER_ID);
    assert!(!theirs.supports_extension_protocol());
    assert_eq!(session.state(), &SessionState::Idle);

    let metainfo = client
        .resolve_metainfo(&mut session, &source)
        .await
        .unwrap();
    assert_eq!(metainfo.info, info);
}

#[tokio::test]
async fn test_magnet_fetches_metadata() {
    let info = info_for(&content(3000), 1024);
    let raw = Bytes::from(encode(&info.to_value()));
    let info_hash = InfoHash::of_info_bytes(&raw);
    let source = MetadataSource::Magnet(magnet_for(info_hash, &[TRACKER]));
    let client = Client::new(ClientConfig::default());
    let (mut session, mut peer) = mock::connected(info_hash);

    let (metainfo, _) = tokio::join!(
        async {
            client.negotiate(&mut session, &source).await?;
            client.resolve_metainfo(&mut session, &source).await
        },
        async {
            let theirs = peer.answer_handshake(true).await;
            assert!(theirs.supports_extension_protocol());
            peer.send(Message::Bitfield(Bytes::from_static(&[0xE0])))
                .await;
            peer.answer_extension_handshake(true, Some(raw.len() as u64))
                .await;
            peer.serve_metadata(&raw).await;
        }
    );

    let metainfo = metainfo.unwrap();
    assert_eq!(metainfo.announce, TRACKER);
    assert_eq!(metainfo.info_hash, info_hash);
    assert_eq!(metainfo.info, info);
    assert_eq!(metainfo.raw_info(), &raw);
}

#[tokio::test]
async fn test_magnet_peer_without_extensions() {
    let source = MetadataSource::Magnet(magnet_for(InfoHash([0x55; 20]), &[TRACKER]));
    let client = Client::new(ClientConfig::default());
    let (mut session, mut peer) = mock::connected(source.info_hash());

    let (result, _) = tokio::join!(client.negotiate(&mut session, &source), async {
        peer.answer_handshake(false).await;
        peer.send(Message::Bitfield(Bytes::from_static(&[0x80])))
            .await;
    });

    assert!(matches!(
        result,
        Err(ClientError::Peer(PeerError::ExtensionUnsupported(_)))
    ));
}

#[tokio::test]
async fn test_download_piece_from_idle_session() {
    let data = content(1500);
    let info = info_for(&data, 1024);
    let source = MetadataSource::Torrent(torrent_for(TRACKER, &info));
    let client = Client::new(ClientConfig::default());
    let (mut session, mut peer) = mock::connected(source.info_hash());

    let (piece, _) = tokio::join!(
        async {
            client.negotiate(&mut session, &source).await?;
            client.download_piece(&mut session, &info, 1).await
        },
        async {
            peer.answer_handshake(false).await;
            peer.send(Message::Bitfield(Bytes::from_static(&[0xC0])))
                .await;
            assert_eq!(peer.recv().await, Message::Interested);
            peer.send(Message::Unchoke).await;
            peer.serve_blocks(&data, 1024, 1).await;
        }
    );

    assert_eq!(&piece.unwrap()[..], &data[1024..]);
    assert_eq!(session.state(), &SessionState::Unchoked);
}

#[tokio::test]
async fn test_download_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("out").join("content.bin");
    let data = content(20000);
    let info = info_for(&data, 8192);
    let source = MetadataSource::Torrent(torrent_for(TRACKER, &info));
    let client = Client::new(ClientConfig::default());
    let (mut session, mut peer) = mock::connected(source.info_hash());

    let (written, _) = tokio::join!(
        async {
            client.negotiate(&mut session, &source).await?;
            client.download_file(&mut session, &info, &path).await
        },
        async {
            peer.accept_download(&[0xE0]).await;
            peer.serve_blocks(&data, 8192, 3).await;
        }
    );

    assert_eq!(written.unwrap(), 20000);
    assert_eq!(tokio::fs::read(&path).await.unwrap(), data);
}

#[tokio::test]
async fn test_announce_without_tracker() {
    let source = MetadataSource::Magnet(magnet_for(InfoHash([0x66; 20]), &[]));
    let client = Client::new(ClientConfig::default());
    assert!(matches!(
        client.announce(&source).await,
        Err(ClientError::NoTracker)
    ));
}

#[tokio::test]
async fn test_magnet_announce_reports_placeholder_left() {
    let (url, server) = serve_tracker(compact_peers_body(&[])).await;
    let source = MetadataSource::Magnet(magnet_for(InfoHash([0x77; 20]), &[&url]));
    let client = Client::new(ClientConfig::default().with_port(7000));

    let peers = client.announce(&source).await.unwrap();
    assert!(peers.is_empty());

    let seen = server.await.unwrap();
    assert!(seen.contains("&port=7000&"));
    assert!(seen.contains(&format!("&left={}&compact=1", MAGNET_ANNOUNCE_LEFT)));
}

#[tokio::test]
async fn test_connect_without_peers() {
    let (url, _server) = serve_tracker(compact_peers_body(&[])).await;
    let info = info_for(&content(10), 10);
    let source = MetadataSource::Torrent(torrent_for(&url, &info));
    let client = Client::new(ClientConfig::default());

    assert!(matches!(
        client.connect(&source).await,
        Err(ClientError::NoPeers)
    ));
}

#[tokio::test]
async fn test_connect_skips_unreachable_peer() {
    let dead = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let info = info_for(&content(10), 10);
    let peer_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let live = peer_listener.local_addr().unwrap();

    let (url, _server) = serve_tracker(compact_peers_body(&[dead, live])).await;
    let source = MetadataSource::Torrent(torrent_for(&url, &info));
    let info_hash = source.info_hash();

    let peer = tokio::spawn(async move {
        let (socket, _) = peer_listener.accept().await.unwrap();
        let mut transport = PeerTransport::new(socket, &ClientConfig::default());
        transport.receive_handshake().await.unwrap();
        transport
            .send_handshake(&Handshake::new(info_hash, REMOTE_PEER_ID, false))
            .await
            .unwrap();
        transport
            .send_message(&Message::Bitfield(Bytes::from_static(&[0x80])))
            .await
            .unwrap();
        transport
    });

    let client = Client::new(ClientConfig::default());
    let (session, metainfo) = client.connect(&source).await.unwrap();
    assert_eq!(session.remote_peer_id(), Some(REMOTE_PEER_ID));
    assert_eq!(session.state(), &SessionState::Idle);
    assert_eq!(metainfo.info, info);

    peer.await.unwrap();
}
