use crate::constants::BLOCK_SIZE;
use crate::peer::BlockRequest;

/// How a single file divides into pieces and pieces into blocks.
///
/// Every piece is `piece_length` bytes except the last, which holds what is
/// left over (or a full `piece_length` when the file divides evenly). Blocks
/// within a piece follow the same rule with `block_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceLayout {
    length: u64,
    piece_length: u64,
    block_size: u32,
}

impl PieceLayout {
    /// `piece_length` must be positive, which [`Info`](crate::metainfo::Info)
    /// guarantees.
    pub fn new(length: u64, piece_length: u64) -> Self {
        Self {
            length,
            piece_length,
            block_size: BLOCK_SIZE,
        }
    }

    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn piece_count(&self) -> u32 {
        self.length.div_ceil(self.piece_length) as u32
    }

    /// Effective length of piece `index`, or `None` past the end.
    pub fn piece_len(&self, index: u32) -> Option<u64> {
        last_aware_len(self.length, self.piece_length, index, self.piece_count())
    }

    /// Byte offset of piece `index` within the file.
    pub fn piece_offset(&self, index: u32) -> u64 {
        u64::from(index) * self.piece_length
    }

    pub fn block_count(&self, piece_len: u64) -> u32 {
        piece_len.div_ceil(u64::from(self.block_size)) as u32
    }

    /// Effective length of block `block` within a piece of `piece_len` bytes.
    pub fn block_len(&self, piece_len: u64, block: u32) -> Option<u32> {
        let count = self.block_count(piece_len);
        last_aware_len(piece_len, u64::from(self.block_size), block, count).map(|len| len as u32)
    }

    /// The block requests that make up piece `index`, in offset order.
    pub fn blocks(&self, index: u32) -> Vec<BlockRequest> {
        let Some(piece_len) = self.piece_len(index) else {
            return Vec::new();
        };

        (0..self.block_count(piece_len))
            .filter_map(|block| {
                let length = self.block_len(piece_len, block)?;
                Some(BlockRequest::new(index, block * self.block_size, length))
            })
            .collect()
    }
}

fn last_aware_len(total: u64, unit: u64, index: u32, count: u32) -> Option<u64> {
    if index >= count {
        return None;
    }
    if index + 1 < count {
        return Some(unit);
    }
    match total % unit {
        0 => Some(unit),
        rem => Some(rem),
    }
}
