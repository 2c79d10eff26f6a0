//! Grouping of an input stream into fixed-size batches of raw lines.

use crate::error::{Error, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Up to `batch_size` raw input lines, terminators included.
///
/// A batch is produced once by the reader and consumed once by whichever
/// worker receives it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Position of this batch in the input, starting at 0.
    pub seq: u64,
    pub lines: Vec<Vec<u8>>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Whether more input may follow the batch just returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    Continue,
    EndOfInput,
}

/// Reads lines from `input` and groups them into [`Batch`]es.
///
/// A batch never holds more than `batch_size` lines. When a batch fills up
/// exactly as the input runs out, it is returned with
/// [`ReadStatus::EndOfInput`], so `L` lines always produce `ceil(L /
/// batch_size)` non-empty batches.
pub struct BatchReader<R> {
    input: R,
    batch_size: usize,
    next_seq: u64,
    lines_read: u64,
}

impl<R> BatchReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(input: R, batch_size: usize) -> Self {
        Self {
            input,
            batch_size: batch_size.max(1),
            next_seq: 0,
            lines_read: 0,
        }
    }

    /// Total lines returned so far.
    pub const fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// Reads the next batch.
    ///
    /// On [`ReadStatus::EndOfInput`] the returned batch is final and may be
    /// partial or empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] on any read failure other than end of input.
    pub async fn read_batch(&mut self) -> Result<(Batch, ReadStatus)> {
        let mut lines = Vec::with_capacity(self.batch_size);

        while lines.len() < self.batch_size {
            let mut line = Vec::new();
            let n = self
                .input
                .read_until(b'\n', &mut line)
                .await
                .map_err(Error::Input)?;
            if n == 0 {
                return Ok((self.seal(lines), ReadStatus::EndOfInput));
            }
            lines.push(line);
        }

        // Peek so a batch that ends exactly at EOF is reported as final.
        let status = if self.input.fill_buf().await.map_err(Error::Input)?.is_empty() {
            ReadStatus::EndOfInput
        } else {
            ReadStatus::Continue
        };

        Ok((self.seal(lines), status))
    }

    fn seal(&mut self, lines: Vec<Vec<u8>>) -> Batch {
        let batch = Batch {
            seq: self.next_seq,
            lines,
        };
        self.next_seq += 1;
        self.lines_read += batch.len() as u64;
        batch
    }
}
