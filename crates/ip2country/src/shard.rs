use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::{
    fs::File,
    io::{AsyncWriteExt, BufWriter},
};

const SHARD_BUFFER_BYTES: usize = 256 * 1024;

/// Buffered, append-only output file owned by exactly one worker.
///
/// Created (or truncated) before the worker starts receiving batches and
/// flushed by [`ShardWriter::finish`] when the worker stops.
#[derive(Debug)]
pub struct ShardWriter {
    path: PathBuf,
    out: BufWriter<File>,
    bytes: u64,
}

impl ShardWriter {
    /// # Errors
    ///
    /// Returns [`Error::ShardCreate`] if the file cannot be created.
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)
            .await
            .map_err(|source| Error::ShardCreate {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            out: BufWriter::with_capacity(SHARD_BUFFER_BYTES, file),
            bytes: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes appended so far.
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }

    /// # Errors
    ///
    /// Returns [`Error::ShardWrite`] if the write fails.
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.out
            .write_all(buf)
            .await
            .map_err(|source| Error::ShardWrite {
                path: self.path.clone(),
                source,
            })?;
        self.bytes += buf.len() as u64;
        Ok(())
    }

    /// Flushes buffered output and closes the file, returning the total bytes
    /// written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShardWrite`] if the flush fails.
    pub async fn finish(mut self) -> Result<u64> {
        self.out
            .shutdown()
            .await
            .map_err(|source| Error::ShardWrite {
                path: self.path.clone(),
                source,
            })?;
        Ok(self.bytes)
    }
}
