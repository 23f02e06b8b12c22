use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, trace, warn};

use super::buffer::PieceBuffer;
use super::error::DownloadError;
use super::layout::PieceLayout;
use crate::metainfo::Info;
use crate::peer::{Block, BlockRequest, Message, PeerSession, SessionState};
use crate::storage::PieceSink;

/// Fetches and verifies pieces from one unchoked peer, one block at a time.
pub struct Downloader<'a, S> {
    session: &'a mut PeerSession<S>,
    info: &'a Info,
    layout: PieceLayout,
}

impl<'a, S> Downloader<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(session: &'a mut PeerSession<S>, info: &'a Info) -> Self {
        let layout = PieceLayout::new(info.length, info.piece_length);
        Self {
            session,
            info,
            layout,
        }
    }

    /// Downloads piece `index` and returns its bytes once they match the
    /// piece digest.
    pub async fn download_piece(&mut self, index: u32) -> Result<Bytes, DownloadError> {
        let info = self.info;
        let expected = info
            .pieces
            .get(index as usize)
            .ok_or(DownloadError::InvalidPieceIndex(index))?;
        let piece_len = self
            .layout
            .piece_len(index)
            .ok_or(DownloadError::InvalidPieceIndex(index))?;

        if self.session.state() != &SessionState::Unchoked {
            return Err(DownloadError::NotReady(self.session.state().clone()));
        }

        debug!(piece = index, length = piece_len, "downloading piece");
        let mut buffer = PieceBuffer::new(index, piece_len);
        for request in self.layout.blocks(index) {
            let block = self.fetch_block(request).await?;
            buffer.push(&block)?;
        }

        match buffer.verify(expected) {
            Ok(data) => {
                debug!(piece = index, "piece verified");
                Ok(data)
            }
            Err(err) => {
                warn!(piece = index, error = %err, "piece failed verification");
                Err(err)
            }
        }
    }

    /// Downloads every piece in order into `sink`, then finishes it.
    /// Returns the number of bytes written.
    pub async fn download_all<K: PieceSink>(&mut self, sink: &mut K) -> Result<u64, DownloadError> {
        let count = self.layout.piece_count();
        let mut written = 0u64;

        for index in 0..count {
            let data = self.download_piece(index).await?;
            sink.write_piece(index, &data).await?;
            written += data.len() as u64;
            info!(piece = index + 1, of = count, "piece written");
        }

        sink.finish().await?;
        Ok(written)
    }

    async fn fetch_block(&mut self, request: BlockRequest) -> Result<Block, DownloadError> {
        trace!(
            piece = request.piece,
            offset = request.offset,
            length = request.length,
            "requesting block"
        );
        self.session.send(&Message::Request(request)).await?;

        loop {
            match self.session.receive().await? {
                Message::Piece(block) if block.answers(&request) => return Ok(block),
                Message::Piece(block) => {
                    return Err(DownloadError::UnexpectedBlock {
                        piece: block.piece,
                        offset: block.offset,
                        length: block.data.len() as u32,
                    })
                }
                Message::Choke => {
                    // A choke drops outstanding requests; ask again once unchoked.
                    self.session.await_unchoke().await?;
                    self.session.send(&Message::Request(request)).await?;
                }
                _ => {}
            }
        }
    }
}
