//! Audio chain feeder.
//!
//! Pipes an ordered list of audio files into a single output stream, one
//! file after another, optionally restarting from the first file when the
//! list is exhausted. A file that cannot be read is skipped; the chain only
//! ends when the list is exhausted (without looping), the output goes away,
//! or the feeder is cancelled.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Size of each read from the current file.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Why the feeder stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeederExit {
    /// Every file was played and looping is disabled; the output was closed.
    Exhausted,
    /// Cancelled through the token.
    Cancelled,
    /// Writing to the output failed (the consumer went away).
    OutputClosed,
    /// A whole pass over the list produced no bytes.
    NothingReadable,
}

enum PipeError {
    Read(io::Error),
    Write(io::Error),
    Cancelled,
}

/// Presents an ordered list of audio files as one continuous byte stream.
#[derive(Debug, Clone)]
pub struct AudioChainFeeder {
    files: Vec<PathBuf>,
    looping: bool,
    chunk_size: usize,
}

impl AudioChainFeeder {
    pub fn new(files: Vec<PathBuf>, looping: bool) -> Self {
        Self {
            files,
            looping,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Run the chain on its own task.
    pub fn spawn<W>(self, output: W, cancellation_token: CancellationToken) -> JoinHandle<FeederExit>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        tokio::spawn(self.run(output, cancellation_token))
    }

    /// Pipe the chain into `output` until it ends.
    ///
    /// The output is dropped on return, which closes it for the consumer.
    pub async fn run<W>(self, mut output: W, cancellation_token: CancellationToken) -> FeederExit
    where
        W: AsyncWrite + Unpin,
    {
        if self.files.is_empty() {
            let _ = output.shutdown().await;
            return FeederExit::Exhausted;
        }

        let mut buf = vec![0u8; self.chunk_size];
        let mut cursor = 0usize;
        let mut pass_bytes = 0u64;

        loop {
            if cancellation_token.is_cancelled() {
                debug!("Audio chain cancelled at file {}", cursor);
                return FeederExit::Cancelled;
            }

            let path = &self.files[cursor];
            match pipe_file(path, &mut output, &mut buf, &cancellation_token).await {
                Ok(bytes) => {
                    debug!(path = %path.display(), bytes, "Audio file finished");
                    pass_bytes += bytes;
                }
                Err(PipeError::Read(e)) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable audio file");
                }
                Err(PipeError::Write(e)) => {
                    debug!(error = %e, "Audio chain output closed");
                    return FeederExit::OutputClosed;
                }
                Err(PipeError::Cancelled) => {
                    debug!("Audio chain cancelled mid-file");
                    return FeederExit::Cancelled;
                }
            }

            cursor += 1;
            if cursor < self.files.len() {
                continue;
            }

            if pass_bytes == 0 {
                warn!(
                    files = self.files.len(),
                    "No audio file in the chain could be read, closing the chain"
                );
                let _ = output.shutdown().await;
                return FeederExit::NothingReadable;
            }

            if !self.looping {
                info!("Audio chain exhausted");
                let _ = output.shutdown().await;
                return FeederExit::Exhausted;
            }

            debug!("Audio chain restarting from the first file");
            cursor = 0;
            pass_bytes = 0;
        }
    }
}

/// Copy one file into the output. Returns the number of bytes written.
async fn pipe_file<W>(
    path: &Path,
    output: &mut W,
    buf: &mut [u8],
    cancellation_token: &CancellationToken,
) -> Result<u64, PipeError>
where
    W: AsyncWrite + Unpin,
{
    let mut file = File::open(path).await.map_err(PipeError::Read)?;
    let mut written = 0u64;

    loop {
        let n = tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => return Err(PipeError::Cancelled),
            read = file.read(buf) => read.map_err(PipeError::Read)?,
        };

        if n == 0 {
            return Ok(written);
        }

        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => return Err(PipeError::Cancelled),
            result = output.write_all(&buf[..n]) => result.map_err(PipeError::Write)?,
        }
        written += n as u64;
    }
}
