//! Destinations for verified pieces.
//!
//! The transfer engine hands each piece to a [`PieceSink`] once its hash has
//! been checked, in ascending piece order. [`FileSink`] lays the pieces out
//! in a single file; [`MemorySink`] keeps them in memory.

mod error;
mod file;
mod memory;

pub use error::StorageError;
pub use file::FileSink;
pub use memory::MemorySink;

use std::future::Future;

/// Receives verified pieces.
pub trait PieceSink {
    /// Stores piece `index`. `data` has already been verified against its
    /// hash.
    fn write_piece(
        &mut self,
        index: u32,
        data: &[u8],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Called once after the last piece has been written.
    fn finish(&mut self) -> impl Future<Output = Result<(), StorageError>> + Send;
}
