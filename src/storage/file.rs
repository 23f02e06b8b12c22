use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use super::error::StorageError;
use super::PieceSink;

/// Writes pieces of a single-file torrent into one file on disk.
///
/// Piece `i` lands at byte offset `i * piece_length`. The file is created (or
/// truncated) and sized to the full length up front.
#[derive(Debug)]
pub struct FileSink {
    file: File,
    path: PathBuf,
    piece_length: u64,
    total_length: u64,
}

impl FileSink {
    pub async fn create(
        path: impl AsRef<Path>,
        piece_length: u64,
        total_length: u64,
    ) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await?;
        file.set_len(total_length).await?;

        debug!(path = %path.display(), total_length, "created output file");
        Ok(Self {
            file,
            path,
            piece_length,
            total_length,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn expected_length(&self, index: u32) -> Result<u64, StorageError> {
        let offset = u64::from(index) * self.piece_length;
        if self.piece_length == 0 || offset >= self.total_length {
            return Err(StorageError::InvalidPieceIndex(index));
        }
        Ok((self.total_length - offset).min(self.piece_length))
    }
}

impl PieceSink for FileSink {
    async fn write_piece(&mut self, index: u32, data: &[u8]) -> Result<(), StorageError> {
        let expected = self.expected_length(index)?;
        if data.len() as u64 != expected {
            return Err(StorageError::InvalidPieceLength {
                piece: index,
                expected,
                actual: data.len() as u64,
            });
        }

        let offset = u64::from(index) * self.piece_length;
        self.file.seek(SeekFrom::Start(offset)).await?;
        self.file.write_all(data).await?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), StorageError> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(())
    }
}
