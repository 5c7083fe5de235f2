//! Record reader for child process output.
//!
//! FFmpeg rewrites its status line with carriage returns (`\r`). When stderr
//! is piped those updates are not newline-terminated, so line-based readers
//! only see them in bursts. This reader yields records delimited by either
//! `\n` or `\r`.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Longest record kept; anything beyond is dropped from the record.
const MAX_RECORD_LEN: usize = 16 * 1024;

/// Reads an async stream and yields trimmed, non-empty text records.
pub struct RecordReader<R> {
    reader: BufReader<R>,
    record: Vec<u8>,
}

impl<R> RecordReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            record: Vec::new(),
        }
    }

    /// Next record, or `None` at end of stream.
    pub async fn next_record(&mut self) -> io::Result<Option<String>> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(self.take_record());
            }

            match available.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(idx) => {
                    append(&mut self.record, &available[..idx]);
                    self.reader.consume(idx + 1);
                    if let Some(record) = self.take_record() {
                        return Ok(Some(record));
                    }
                }
                None => {
                    let len = available.len();
                    append(&mut self.record, available);
                    self.reader.consume(len);
                }
            }
        }
    }

    fn take_record(&mut self) -> Option<String> {
        let record = String::from_utf8_lossy(&self.record).trim().to_string();
        self.record.clear();
        (!record.is_empty()).then_some(record)
    }
}

fn append(record: &mut Vec<u8>, bytes: &[u8]) {
    let room = MAX_RECORD_LEN.saturating_sub(record.len());
    record.extend_from_slice(&bytes[..bytes.len().min(room)]);
}
