use bytes::{Bytes, BytesMut};
use sha1::{Digest, Sha1};

use super::error::DownloadError;
use crate::peer::Block;

/// Accumulates the blocks of one piece in arrival order.
#[derive(Debug)]
pub struct PieceBuffer {
    index: u32,
    length: usize,
    data: BytesMut,
}

impl PieceBuffer {
    pub fn new(index: u32, length: u64) -> Self {
        Self {
            index,
            length: length as usize,
            data: BytesMut::with_capacity(length as usize),
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Offset the next block must start at.
    pub fn filled(&self) -> usize {
        self.data.len()
    }

    pub fn is_complete(&self) -> bool {
        self.data.len() == self.length
    }

    /// Appends `block`, which must continue the piece where the previous
    /// block ended.
    pub fn push(&mut self, block: &Block) -> Result<(), DownloadError> {
        let fits = block.piece == self.index
            && block.offset as usize == self.data.len()
            && self.data.len() + block.data.len() <= self.length;

        if !fits {
            return Err(DownloadError::UnexpectedBlock {
                piece: block.piece,
                offset: block.offset,
                length: block.data.len() as u32,
            });
        }

        self.data.extend_from_slice(&block.data);
        Ok(())
    }

    /// Hashes the assembled piece and returns it if the digest matches.
    pub fn verify(self, expected: &[u8; 20]) -> Result<Bytes, DownloadError> {
        let actual: [u8; 20] = Sha1::digest(&self.data).into();
        if !self.is_complete() || &actual != expected {
            return Err(DownloadError::PieceIntegrity {
                piece: self.index,
                expected: hex::encode(expected),
                actual: hex::encode(actual),
            });
        }
        Ok(self.data.freeze())
    }
}
