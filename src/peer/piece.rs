use bytes::{Buf, BufMut, Bytes};

use super::error::PeerError;

/// A request for `length` bytes of piece `piece` starting at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRequest {
    pub piece: u32,
    pub offset: u32,
    pub length: u32,
}

impl BlockRequest {
    pub const ENCODED_LEN: usize = 12;

    pub fn new(piece: u32, offset: u32, length: u32) -> Self {
        Self {
            piece,
            offset,
            length,
        }
    }

    pub(crate) fn encode_into<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.piece);
        buf.put_u32(self.offset);
        buf.put_u32(self.length);
    }

    pub(crate) fn decode(mut payload: &[u8]) -> Result<Self, PeerError> {
        if payload.len() != Self::ENCODED_LEN {
            return Err(PeerError::InvalidMessage(format!(
                "block request must carry {} bytes, got {}",
                Self::ENCODED_LEN,
                payload.len()
            )));
        }
        Ok(Self {
            piece: payload.get_u32(),
            offset: payload.get_u32(),
            length: payload.get_u32(),
        })
    }
}

/// Block data delivered by a `piece` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub piece: u32,
    pub offset: u32,
    pub data: Bytes,
}

impl Block {
    pub fn new(piece: u32, offset: u32, data: Bytes) -> Self {
        Self {
            piece,
            offset,
            data,
        }
    }

    /// Whether this block is the answer to `request`.
    pub fn answers(&self, request: &BlockRequest) -> bool {
        self.piece == request.piece
            && self.offset == request.offset
            && self.data.len() == request.length as usize
    }
}
