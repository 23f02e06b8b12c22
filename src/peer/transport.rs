use std::future::Future;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::trace;

use super::error::PeerError;
use super::message::{Handshake, Message, HANDSHAKE_LEN};
use crate::config::ClientConfig;

/// Framed reads and writes over a peer connection.
///
/// Reads accumulate into an internal buffer until a whole handshake or frame
/// is available, so short reads from the stream never surface as short
/// messages.
pub struct PeerTransport<S> {
    stream: S,
    read_buf: BytesMut,
    read_timeout: Duration,
    write_timeout: Duration,
    max_message_size: usize,
}

impl<S> PeerTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, config: &ClientConfig) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(32 * 1024),
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            max_message_size: config.max_message_size,
        }
    }

    pub async fn send_handshake(&mut self, handshake: &Handshake) -> Result<(), PeerError> {
        let data = handshake.encode();
        self.write_all(&data).await
    }

    pub async fn receive_handshake(&mut self) -> Result<Handshake, PeerError> {
        self.fill_to(HANDSHAKE_LEN).await?;
        let data = self.read_buf.split_to(HANDSHAKE_LEN);
        Handshake::decode(&data)
    }

    pub async fn send_message(&mut self, message: &Message) -> Result<(), PeerError> {
        trace!(id = ?message.id(), "sending message");
        let data = message.encode();
        self.write_all(&data).await
    }

    pub async fn receive_message(&mut self) -> Result<Message, PeerError> {
        self.fill_to(4).await?;

        let length = u32::from_be_bytes([
            self.read_buf[0],
            self.read_buf[1],
            self.read_buf[2],
            self.read_buf[3],
        ]) as usize;

        if length > self.max_message_size {
            return Err(PeerError::InvalidMessage(format!(
                "message too large: {}",
                length
            )));
        }

        let total_len = 4 + length;
        self.fill_to(total_len).await?;

        let data = self.read_buf.split_to(total_len);
        let message = Message::decode(data.freeze())?;
        trace!(id = ?message.id(), length, "received message");
        Ok(message)
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    async fn fill_to(&mut self, len: usize) -> Result<(), PeerError> {
        while self.read_buf.len() < len {
            let n = with_timeout(self.read_timeout, self.stream.read_buf(&mut self.read_buf))
                .await?;

            if n == 0 {
                return Err(PeerError::ConnectionClosed);
            }
        }
        Ok(())
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), PeerError> {
        let stream = &mut self.stream;
        with_timeout(self.write_timeout, async move {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await
    }
}

async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, PeerError>
where
    F: Future<Output = std::io::Result<T>>,
{
    timeout(limit, fut).await.map_err(|_| PeerError::Timeout)?.map_err(PeerError::from)
}
