use super::*;
use crate::metainfo::{Info, InfoHash};
use crate::peer::mock::{self, block_for, MockPeer};
use crate::peer::{Block, BlockRequest, Message, PeerSession, SessionState};
use crate::storage::{FileSink, MemorySink};
use bytes::Bytes;
use sha1::{Digest, Sha1};
use tempfile::TempDir;
use tokio::io::DuplexStream;

const INFO_HASH: InfoHash = InfoHash([0x33; 20]);

fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
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

async fn unchoked_session() -> (PeerSession<DuplexStream>, MockPeer) {
    let (mut session, mut peer) = mock::connected(INFO_HASH);
    tokio::join!(
        async {
            session.handshake(false).await.unwrap();
            session.receive_bitfield().await.unwrap();
            session.express_interest().await.unwrap();
            session.await_unchoke().await.unwrap();
        },
        peer.accept_download(&[0xFF])
    );
    assert_eq!(session.state(), &SessionState::Unchoked);
    (session, peer)
}

#[test]
fn test_piece_partition_even() {
    let layout = PieceLayout::new(1024, 512);
    assert_eq!(layout.piece_count(), 2);
    assert_eq!(layout.piece_len(0), Some(512));
    assert_eq!(layout.piece_len(1), Some(512));
    assert_eq!(layout.piece_len(2), None);
}

#[test]
fn test_piece_partition_remainder() {
    let layout = PieceLayout::new(1000, 512);
    assert_eq!(layout.piece_count(), 2);
    assert_eq!(layout.piece_len(0), Some(512));
    assert_eq!(layout.piece_len(1), Some(488));
    assert_eq!(layout.piece_offset(1), 512);
}

#[test]
fn test_block_partition_exact() {
    let layout = PieceLayout::new(16384, 16384);
    assert_eq!(layout.block_count(16384), 1);
    assert_eq!(layout.block_len(16384, 0), Some(16384));
    assert_eq!(layout.block_len(16384, 1), None);
}

#[test]
fn test_block_partition_remainder() {
    let layout = PieceLayout::new(20000, 20000);
    assert_eq!(layout.block_count(20000), 2);
    assert_eq!(layout.block_len(20000, 0), Some(16384));
    assert_eq!(layout.block_len(20000, 1), Some(3616));

    assert_eq!(
        layout.blocks(0),
        vec![
            BlockRequest::new(0, 0, 16384),
            BlockRequest::new(0, 16384, 3616)
        ]
    );
    assert!(layout.blocks(1).is_empty());
}

#[test]
fn test_empty_file_has_no_pieces() {
    let layout = PieceLayout::new(0, 512);
    assert_eq!(layout.piece_count(), 0);
    assert_eq!(layout.piece_len(0), None);
}

#[test]
fn test_custom_block_size() {
    let layout = PieceLayout::new(1000, 512).with_block_size(200);
    let lengths: Vec<u32> = layout.blocks(1).iter().map(|b| b.length).collect();
    assert_eq!(lengths, vec![200, 200, 88]);
}

#[test]
fn test_piece_buffer_verifies_digest() {
    let data = content(300);
    let digest: [u8; 20] = Sha1::digest(&data).into();

    let mut buffer = PieceBuffer::new(4, 300);
    buffer
        .push(&Block::new(4, 0, Bytes::copy_from_slice(&data[..200])))
        .unwrap();
    assert!(!buffer.is_complete());
    assert_eq!(buffer.filled(), 200);
    buffer
        .push(&Block::new(4, 200, Bytes::copy_from_slice(&data[200..])))
        .unwrap();
    assert!(buffer.is_complete());

    assert_eq!(&buffer.verify(&digest).unwrap()[..], &data[..]);
}

#[test]
fn test_piece_buffer_rejects_misplaced_blocks() {
    let mut buffer = PieceBuffer::new(0, 100);
    assert!(matches!(
        buffer.push(&Block::new(0, 50, Bytes::from(vec![0u8; 50]))),
        Err(DownloadError::UnexpectedBlock { offset: 50, .. })
    ));
    assert!(matches!(
        buffer.push(&Block::new(1, 0, Bytes::from(vec![0u8; 50]))),
        Err(DownloadError::UnexpectedBlock { piece: 1, .. })
    ));
    assert!(matches!(
        buffer.push(&Block::new(0, 0, Bytes::from(vec![0u8; 101]))),
        Err(DownloadError::UnexpectedBlock { .. })
    ));
}

#[test]
fn test_piece_buffer_integrity_failure() {
    let mut buffer = PieceBuffer::new(2, 4);
    buffer
        .push(&Block::new(2, 0, Bytes::from_static(b"abcd")))
        .unwrap();

    match buffer.verify(&[0u8; 20]) {
        Err(DownloadError::PieceIntegrity {
            piece,
            expected,
            actual,
        }) => {
            assert_eq!(piece, 2);
            assert_eq!(expected, "0".repeat(40));
            assert_eq!(actual, hex::encode(Sha1::digest(b"abcd")));
        }
        other => panic!("expected integrity failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_download_piece_in_blocks() {
    let data = content(30000);
    let info = info_for(&data, 20000);
    let (mut session, mut peer) = unchoked_session().await;

    let mut downloader = Downloader::new(&mut session, &info);
    let (piece, requests) = tokio::join!(
        downloader.download_piece(0),
        peer.serve_blocks(&data, 20000, 2)
    );

    assert_eq!(&piece.unwrap()[..], &data[..20000]);
    assert_eq!(
        requests,
        vec![
            BlockRequest::new(0, 0, 16384),
            BlockRequest::new(0, 16384, 3616)
        ]
    );
}

#[tokio::test]
async fn test_download_last_short_piece() {
    let data = content(30000);
    let info = info_for(&data, 20000);
    let (mut session, mut peer) = unchoked_session().await;

    let mut downloader = Downloader::new(&mut session, &info);
    let (piece, requests) = tokio::join!(
        downloader.download_piece(1),
        peer.serve_blocks(&data, 20000, 1)
    );

    assert_eq!(&piece.unwrap()[..], &data[20000..]);
    assert_eq!(requests, vec![BlockRequest::new(1, 0, 10000)]);
}

#[tokio::test]
async fn test_download_all_in_order() {
    let data = content(1000);
    let info = info_for(&data, 512);
    let (mut session, mut peer) = unchoked_session().await;
    let mut sink = MemorySink::new();

    let mut downloader = Downloader::new(&mut session, &info);
    let (written, requests) = tokio::join!(
        downloader.download_all(&mut sink),
        peer.serve_blocks(&data, 512, 2)
    );

    assert_eq!(written.unwrap(), 1000);
    assert_eq!(
        requests,
        vec![BlockRequest::new(0, 0, 512), BlockRequest::new(1, 0, 488)]
    );
    assert!(sink.is_finished());
    assert_eq!(&sink.to_bytes()[..], &data[..]);
}

#[tokio::test]
async fn test_integrity_failure_is_not_written() {
    let data = content(1000);
    let mut info = info_for(&data, 512);
    info.pieces[1] = [0xEE; 20];
    let (mut session, mut peer) = unchoked_session().await;
    let mut sink = MemorySink::new();

    let mut downloader = Downloader::new(&mut session, &info);
    let (result, _) = tokio::join!(
        downloader.download_all(&mut sink),
        peer.serve_blocks(&data, 512, 2)
    );

    assert!(matches!(
        result,
        Err(DownloadError::PieceIntegrity { piece: 1, .. })
    ));
    assert!(sink.piece(0).is_some());
    assert!(sink.piece(1).is_none());
    assert!(!sink.is_finished());
}

#[tokio::test]
async fn test_choke_mid_transfer_resends_request() {
    let data = content(600);
    let info = info_for(&data, 600);
    let (mut session, mut peer) = unchoked_session().await;

    let mut downloader = Downloader::new(&mut session, &info);
    let (piece, _) = tokio::join!(downloader.download_piece(0), async {
        let first = peer.recv_request().await;
        peer.send(Message::Choke).await;
        peer.send(Message::KeepAlive).await;
        peer.send(Message::Unchoke).await;

        let again = peer.recv_request().await;
        assert_eq!(first, again);
        peer.send(Message::Piece(block_for(&data, 600, &again))).await;
    });

    assert_eq!(&piece.unwrap()[..], &data[..]);
    assert_eq!(session.state(), &SessionState::Unchoked);
}

#[tokio::test]
async fn test_unrelated_messages_are_ignored() {
    let data = content(100);
    let info = info_for(&data, 100);
    let (mut session, mut peer) = unchoked_session().await;

    let mut downloader = Downloader::new(&mut session, &info);
    let (piece, _) = tokio::join!(downloader.download_piece(0), async {
        let request = peer.recv_request().await;
        peer.send(Message::Have { piece: 0 }).await;
        peer.send(Message::Unknown {
            id: 99,
            payload: Bytes::from_static(b"?"),
        })
        .await;
        peer.send(Message::Piece(block_for(&data, 100, &request))).await;
    });

    assert_eq!(&piece.unwrap()[..], &data[..]);
}

#[tokio::test]
async fn test_unexpected_block() {
    let data = content(100);
    let info = info_for(&data, 100);
    let (mut session, mut peer) = unchoked_session().await;

    let mut downloader = Downloader::new(&mut session, &info);
    let (result, _) = tokio::join!(downloader.download_piece(0), async {
        peer.recv_request().await;
        peer.send(Message::Piece(Block::new(0, 10, Bytes::from_static(b"x"))))
            .await;
    });

    assert!(matches!(
        result,
        Err(DownloadError::UnexpectedBlock {
            piece: 0,
            offset: 10,
            length: 1
        })
    ));
}

#[tokio::test]
async fn test_download_requires_unchoked_session() {
    let data = content(100);
    let info = info_for(&data, 100);
    let (mut session, _peer) = mock::connected(INFO_HASH);

    let mut downloader = Downloader::new(&mut session, &info);
    assert!(matches!(
        downloader.download_piece(0).await,
        Err(DownloadError::NotReady(SessionState::Connecting))
    ));
}

#[tokio::test]
async fn test_invalid_piece_index() {
    let data = content(100);
    let info = info_for(&data, 100);
    let (mut session, _peer) = unchoked_session().await;

    let mut downloader = Downloader::new(&mut session, &info);
    assert!(matches!(
        downloader.download_piece(1).await,
        Err(DownloadError::InvalidPieceIndex(1))
    ));
}

#[tokio::test]
async fn test_peer_disconnect_surfaces_peer_error() {
    let data = content(100);
    let info = info_for(&data, 100);
    let (mut session, peer) = unchoked_session().await;
    drop(peer);

    let mut downloader = Downloader::new(&mut session, &info);
    let err = downloader.download_piece(0).await.unwrap_err();
    assert!(matches!(err, DownloadError::Peer(ref e) if e.is_transport()));
}

#[tokio::test]
async fn test_download_all_to_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("content.bin");
    let data = content(40000);
    let info = info_for(&data, 16384);
    let (mut session, mut peer) = unchoked_session().await;
    let mut sink = FileSink::create(&path, info.piece_length, info.length)
        .await
        .unwrap();

    let mut downloader = Downloader::new(&mut session, &info);
    let (written, _) = tokio::join!(
        downloader.download_all(&mut sink),
        peer.serve_blocks(&data, 16384, 3)
    );

    assert_eq!(written.unwrap(), 40000);
    assert_eq!(tokio::fs::read(&path).await.unwrap(), data);
}
