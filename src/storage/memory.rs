use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};

use super::error::StorageError;
use super::PieceSink;

/// Keeps written pieces in memory, keyed by index.
#[derive(Debug, Default)]
pub struct MemorySink {
    pieces: BTreeMap<u32, Bytes>,
    finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn piece(&self, index: u32) -> Option<&Bytes> {
        self.pieces.get(&index)
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// All pieces concatenated in index order.
    pub fn to_bytes(&self) -> Bytes {
        let len = self.pieces.values().map(Bytes::len).sum();
        let mut out = BytesMut::with_capacity(len);
        for piece in self.pieces.values() {
            out.extend_from_slice(piece);
        }
        out.freeze()
    }
}

impl PieceSink for MemorySink {
    async fn write_piece(&mut self, index: u32, data: &[u8]) -> Result<(), StorageError> {
        self.pieces.insert(index, Bytes::copy_from_slice(data));
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), StorageError> {
        self.finished = true;
        Ok(())
    }
}
