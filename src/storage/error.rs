use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid piece index: {0}")]
    InvalidPieceIndex(u32),

    #[error("piece {piece} has {actual} bytes, expected {expected}")]
    InvalidPieceLength {
        piece: u32,
        expected: u64,
        actual: u64,
    },
}
