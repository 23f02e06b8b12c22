use super::error::PeerError;
use super::peer_id::PeerId;
use super::piece::{Block, BlockRequest};
use crate::metainfo::InfoHash;
use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const PROTOCOL: &[u8] = b"BitTorrent protocol";
pub const HANDSHAKE_LEN: usize = 68;

/// Reserved-byte flag advertising the extension protocol (BEP-10).
const EXTENSION_BIT: (usize, u8) = (5, 0x10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    Choke = 0,
    Unchoke = 1,
    Interested = 2,
    NotInterested = 3,
    Have = 4,
    Bitfield = 5,
    Request = 6,
    Piece = 7,
    Cancel = 8,
    Extended = 20,
}

impl TryFrom<u8> for MessageId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageId::Choke),
            1 => Ok(MessageId::Unchoke),
            2 => Ok(MessageId::Interested),
            3 => Ok(MessageId::NotInterested),
            4 => Ok(MessageId::Have),
            5 => Ok(MessageId::Bitfield),
            6 => Ok(MessageId::Request),
            7 => Ok(MessageId::Piece),
            8 => Ok(MessageId::Cancel),
            20 => Ok(MessageId::Extended),
            other => Err(other),
        }
    }
}

/// The fixed 68-byte opening message of every connection.
///
/// Layout: `19`, `"BitTorrent protocol"`, 8 reserved bytes, info hash, peer id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
    pub reserved: [u8; 8],
}

impl Handshake {
    /// Builds a handshake. The reserved bytes are all zero except the
    /// extension-protocol bit when `extensions` is set.
    pub fn new(info_hash: InfoHash, peer_id: PeerId, extensions: bool) -> Self {
        let mut reserved = [0u8; 8];
        if extensions {
            reserved[EXTENSION_BIT.0] |= EXTENSION_BIT.1;
        }
        Self {
            info_hash,
            peer_id,
            reserved,
        }
    }

    pub fn supports_extension_protocol(&self) -> bool {
        (self.reserved[EXTENSION_BIT.0] & EXTENSION_BIT.1) != 0
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
        buf.put_u8(PROTOCOL.len() as u8);
        buf.put_slice(PROTOCOL);
        buf.put_slice(&self.reserved);
        buf.put_slice(self.info_hash.as_bytes());
        buf.put_slice(self.peer_id.as_bytes());
        buf.freeze()
    }

    pub fn decode(data: &[u8]) -> Result<Self, PeerError> {
        if data.len() != HANDSHAKE_LEN {
            return Err(PeerError::InvalidMessage(format!(
                "handshake must be {} bytes, got {}",
                HANDSHAKE_LEN,
                data.len()
            )));
        }

        if data[0] as usize != PROTOCOL.len() || &data[1..20] != PROTOCOL {
            return Err(PeerError::ProtocolMismatch);
        }

        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&data[20..28]);

        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&data[28..48]);

        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&data[48..68]);

        Ok(Self {
            info_hash: InfoHash(info_hash),
            peer_id: PeerId(peer_id),
            reserved,
        })
    }
}

/// A length-prefixed peer wire message.
///
/// On the wire every message is `<len: u32 BE><id: u8><payload>`, where `len`
/// counts the id byte and the payload. A zero length with no id is a
/// keep-alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have { piece: u32 },
    Bitfield(Bytes),
    Request(BlockRequest),
    Piece(Block),
    Cancel(BlockRequest),
    /// Extension protocol message; `id` 0 is the extension handshake.
    Extended { id: u8, payload: Bytes },
    /// Any message id this client does not model. Kept so it can be skipped.
    Unknown { id: u8, payload: Bytes },
}

impl Message {
    /// The message id byte, or `None` for a keep-alive.
    pub fn id(&self) -> Option<u8> {
        let id = match self {
            Message::KeepAlive => return None,
            Message::Choke => MessageId::Choke,
            Message::Unchoke => MessageId::Unchoke,
            Message::Interested => MessageId::Interested,
            Message::NotInterested => MessageId::NotInterested,
            Message::Have { .. } => MessageId::Have,
            Message::Bitfield(_) => MessageId::Bitfield,
            Message::Request(_) => MessageId::Request,
            Message::Piece(_) => MessageId::Piece,
            Message::Cancel(_) => MessageId::Cancel,
            Message::Extended { .. } => MessageId::Extended,
            Message::Unknown { id, .. } => return Some(*id),
        };
        Some(id as u8)
    }

    pub fn encode(&self) -> Bytes {
        let mut payload = BytesMut::new();

        match self {
            Message::KeepAlive => {
                let mut buf = BytesMut::with_capacity(4);
                buf.put_u32(0);
                return buf.freeze();
            }
            Message::Choke | Message::Unchoke | Message::Interested | Message::NotInterested => {}
            Message::Have { piece } => payload.put_u32(*piece),
            Message::Bitfield(bits) => payload.put_slice(bits),
            Message::Request(req) | Message::Cancel(req) => req.encode_into(&mut payload),
            Message::Piece(block) => {
                payload.put_u32(block.piece);
                payload.put_u32(block.offset);
                payload.put_slice(&block.data);
            }
            Message::Extended { id, payload: ext } => {
                payload.put_u8(*id);
                payload.put_slice(ext);
            }
            Message::Unknown { payload: raw, .. } => payload.put_slice(raw),
        }

        let mut buf = BytesMut::with_capacity(5 + payload.len());
        buf.put_u32(1 + payload.len() as u32);
        // KeepAlive returned above, every other variant has an id.
        buf.put_u8(self.id().unwrap_or_default());
        buf.put_slice(&payload);
        buf.freeze()
    }

    /// Decodes one complete frame, length prefix included.
    pub fn decode(mut data: Bytes) -> Result<Self, PeerError> {
        if data.len() < 4 {
            return Err(PeerError::InvalidMessage("too short".into()));
        }

        let length = data.get_u32() as usize;

        if length == 0 {
            if data.has_remaining() {
                return Err(PeerError::InvalidMessage("keep-alive with payload".into()));
            }
            return Ok(Message::KeepAlive);
        }

        if data.remaining() != length {
            return Err(PeerError::InvalidMessage(format!(
                "declared length {} but frame carries {}",
                length,
                data.remaining()
            )));
        }

        let id = data.get_u8();
        Self::from_parts(id, data)
    }

    /// Builds a message from its id byte and payload.
    pub fn from_parts(id: u8, mut payload: Bytes) -> Result<Self, PeerError> {
        let id = match MessageId::try_from(id) {
            Ok(id) => id,
            Err(id) => return Ok(Message::Unknown { id, payload }),
        };

        let message = match id {
            MessageId::Choke => Message::Choke,
            MessageId::Unchoke => Message::Unchoke,
            MessageId::Interested => Message::Interested,
            MessageId::NotInterested => Message::NotInterested,
            MessageId::Have => {
                if payload.remaining() != 4 {
                    return Err(PeerError::InvalidMessage("have must carry 4 bytes".into()));
                }
                Message::Have {
                    piece: payload.get_u32(),
                }
            }
            MessageId::Bitfield => Message::Bitfield(payload),
            MessageId::Request => Message::Request(BlockRequest::decode(&payload)?),
            MessageId::Cancel => Message::Cancel(BlockRequest::decode(&payload)?),
            MessageId::Piece => {
                if payload.remaining() < 8 {
                    return Err(PeerError::InvalidMessage("piece too short".into()));
                }
                let piece = payload.get_u32();
                let offset = payload.get_u32();
                Message::Piece(Block::new(piece, offset, payload))
            }
            MessageId::Extended => {
                if !payload.has_remaining() {
                    return Err(PeerError::InvalidMessage("extended too short".into()));
                }
                let ext_id = payload.get_u8();
                Message::Extended {
                    id: ext_id,
                    payload,
                }
            }
        };

        Ok(message)
    }
}
