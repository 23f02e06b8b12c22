//! Metadata exchange extension (`ut_metadata`, BEP-9).
//!
//! Used to fetch the info dictionary from a peer when only a magnet link is
//! known. Each message is a bencoded header dictionary; `data` messages carry
//! the raw metadata piece directly after it.

use bytes::{Bytes, BytesMut};

use super::error::PeerError;
use crate::bencode::{decode_prefix, encode_into, Value};
use crate::constants::METADATA_PIECE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataMessageType {
    Request = 0,
    Data = 1,
    Reject = 2,
}

impl MetadataMessageType {
    pub fn from_integer(n: i64) -> Option<Self> {
        match n {
            0 => Some(MetadataMessageType::Request),
            1 => Some(MetadataMessageType::Data),
            2 => Some(MetadataMessageType::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataMessage {
    pub msg_type: MetadataMessageType,
    pub piece: u32,
    /// Only present in data messages.
    pub total_size: Option<u64>,
    /// Only present in data messages.
    pub data: Option<Bytes>,
}

impl MetadataMessage {
    pub fn request(piece: u32) -> Self {
        Self {
            msg_type: MetadataMessageType::Request,
            piece,
            total_size: None,
            data: None,
        }
    }

    pub fn data(piece: u32, total_size: u64, data: Bytes) -> Self {
        Self {
            msg_type: MetadataMessageType::Data,
            piece,
            total_size: Some(total_size),
            data: Some(data),
        }
    }

    pub fn reject(piece: u32) -> Self {
        Self {
            msg_type: MetadataMessageType::Reject,
            piece,
            total_size: None,
            data: None,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut entries = vec![
            ("msg_type", Value::Integer(self.msg_type as i64)),
            ("piece", Value::Integer(i64::from(self.piece))),
        ];
        if let Some(total_size) = self.total_size {
            entries.push(("total_size", Value::Integer(total_size as i64)));
        }

        let mut buf = BytesMut::new();
        encode_into(&Value::dict(entries), &mut buf);
        if let Some(ref data) = self.data {
            buf.extend_from_slice(data);
        }
        buf.freeze()
    }

    /// Splits the payload into its header dictionary and, for data messages,
    /// the trailing metadata bytes.
    pub fn decode(payload: &[u8]) -> Result<Self, PeerError> {
        let (header, rest) = decode_prefix(payload)?;

        if header.as_dict().is_none() {
            return Err(invalid("header is not a dictionary"));
        }

        let msg_type = header
            .get(b"msg_type")
            .and_then(Value::as_integer)
            .ok_or_else(|| invalid("missing msg_type"))?;
        let msg_type = MetadataMessageType::from_integer(msg_type)
            .ok_or_else(|| invalid("unknown msg_type"))?;

        let piece = header
            .get(b"piece")
            .and_then(Value::as_integer)
            .and_then(|p| u32::try_from(p).ok())
            .ok_or_else(|| invalid("missing piece"))?;

        let total_size = header
            .get(b"total_size")
            .and_then(Value::as_integer)
            .and_then(|s| u64::try_from(s).ok());

        let data = match msg_type {
            MetadataMessageType::Data => Some(Bytes::copy_from_slice(rest)),
            _ => None,
        };

        Ok(Self {
            msg_type,
            piece,
            total_size,
            data,
        })
    }
}

fn invalid(reason: &str) -> PeerError {
    PeerError::InvalidMessage(format!("ut_metadata: {}", reason))
}

/// Number of 16 KiB metadata pieces needed to carry `metadata_size` bytes.
pub fn metadata_piece_count(metadata_size: u64) -> u32 {
    metadata_size.div_ceil(METADATA_PIECE_SIZE as u64) as u32
}

/// Collects metadata pieces in order until `total_size` bytes are present.
#[derive(Debug)]
pub(crate) struct MetadataBuffer {
    total_size: Option<u64>,
    data: BytesMut,
    next_piece: u32,
    max_size: u64,
}

impl MetadataBuffer {
    pub fn new(total_size: Option<u64>, max_size: u64) -> Result<Self, PeerError> {
        let mut buffer = Self {
            total_size: None,
            data: BytesMut::new(),
            next_piece: 0,
            max_size,
        };
        if let Some(size) = total_size {
            buffer.set_total_size(size)?;
        }
        Ok(buffer)
    }

    pub fn next_piece(&self) -> u32 {
        self.next_piece
    }

    pub fn is_complete(&self) -> bool {
        self.total_size == Some(self.data.len() as u64)
    }

    /// Appends the data of piece `next_piece()`.
    pub fn push(&mut self, message: MetadataMessage) -> Result<(), PeerError> {
        match message.msg_type {
            MetadataMessageType::Reject => return Err(PeerError::MetadataRejected(message.piece)),
            MetadataMessageType::Request => return Err(invalid("unexpected request")),
            MetadataMessageType::Data => {}
        }

        if message.piece != self.next_piece {
            return Err(invalid("metadata piece out of order"));
        }

        if self.total_size.is_none() {
            let size = message
                .total_size
                .ok_or_else(|| invalid("data message without total_size"))?;
            self.set_total_size(size)?;
        }
        let total_size = self.total_size.unwrap_or_default();

        let data = message.data.unwrap_or_default();
        let offset = u64::from(self.next_piece) * METADATA_PIECE_SIZE as u64;
        let expected = (total_size - offset).min(METADATA_PIECE_SIZE as u64);
        if data.len() as u64 != expected {
            return Err(invalid("metadata piece has wrong length"));
        }

        self.data.extend_from_slice(&data);
        self.next_piece += 1;
        Ok(())
    }

    pub fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }

    fn set_total_size(&mut self, size: u64) -> Result<(), PeerError> {
        if size == 0 || size > self.max_size {
            return Err(invalid("metadata size out of range"));
        }
        self.total_size = Some(size);
        Ok(())
    }
}
