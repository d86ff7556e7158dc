//! Streaming MBOX splitter.
//!
//! Reads the file line by line through a large buffer and hands each message
//! to a callback, so mailboxes far bigger than memory can be normalized.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{NormalizeError, Result};

/// Size of the internal read buffer.
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Messages larger than this are truncated (256 MB).
const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

/// How often (in bytes read) the progress callback fires.
const PROGRESS_INTERVAL: u64 = 4 * 1024 * 1024;

/// One message cut out of an MBOX file.
#[derive(Debug)]
pub struct MboxMessage<'a> {
    /// Zero-based position in the mailbox.
    pub index: u64,
    /// Byte offset of the `From ` separator line.
    pub offset: u64,
    /// The message, separator line included.
    pub raw: &'a [u8],
}

/// Splits an MBOX file into messages.
///
/// Tolerates mixed `\n` / `\r\n` endings, `From ` lines without a preceding
/// blank line (logged), a leading BOM and a truncated last message.
pub struct MboxReader {
    path: PathBuf,
    file_size: u64,
    max_message_size: usize,
}

impl MboxReader {
    /// Open `path`. Only existence is checked, not MBOX validity.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                NormalizeError::FileNotFound(path.clone())
            } else {
                NormalizeError::io(&path, e)
            }
        })?;
        if metadata.is_dir() {
            return Err(NormalizeError::InvalidPath(format!(
                "{} is a directory",
                path.display()
            )));
        }
        Ok(Self {
            path,
            file_size: metadata.len(),
            max_message_size: MAX_MESSAGE_SIZE,
        })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Call `on_message` for every message; it returns `false` to stop early.
    /// `on_progress` receives `(bytes_read, file_size)`.
    ///
    /// Returns the number of messages delivered.
    pub fn for_each_message(
        &self,
        on_message: &mut dyn FnMut(MboxMessage<'_>) -> bool,
        on_progress: Option<&dyn Fn(u64, u64)>,
    ) -> Result<u64> {
        if self.file_size == 0 {
            return Ok(0);
        }

        let file = File::open(&self.path).map_err(|e| NormalizeError::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut splitter = Splitter::new(self.max_message_size);
        let mut line: Vec<u8> = Vec::with_capacity(4096);
        let mut bytes_read: u64 = 0;
        let mut last_progress: u64 = 0;

        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| NormalizeError::io(&self.path, e))?;
            if n == 0 {
                break;
            }

            if let Some(done) = splitter.push_line(&line) {
                if !on_message(done.as_message()) {
                    return Ok(splitter.delivered);
                }
                splitter.delivered += 1;
            }

            bytes_read += n as u64;
            if let Some(cb) = on_progress {
                if bytes_read - last_progress >= PROGRESS_INTERVAL {
                    cb(bytes_read, self.file_size);
                    last_progress = bytes_read;
                }
            }
        }

        if let Some(done) = splitter.finish() {
            if on_message(done.as_message()) {
                splitter.delivered += 1;
            }
        }

        if let Some(cb) = on_progress {
            cb(self.file_size, self.file_size);
        }

        Ok(splitter.delivered)
    }
}

/// Line-driven state machine behind [`MboxReader`].
struct Splitter {
    max_message_size: usize,
    buf: Vec<u8>,
    start: u64,
    offset: u64,
    delivered: u64,
    prev_blank: bool,
    first_line: bool,
    truncated: bool,
}

/// A finished message, owned until the callback has seen it.
struct Completed {
    index: u64,
    offset: u64,
    raw: Vec<u8>,
}

impl Completed {
    fn as_message(&self) -> MboxMessage<'_> {
        MboxMessage {
            index: self.index,
            offset: self.offset,
            raw: &self.raw,
        }
    }
}

impl Splitter {
    fn new(max_message_size: usize) -> Self {
        Self {
            max_message_size,
            buf: Vec::with_capacity(64 * 1024),
            start: 0,
            offset: 0,
            delivered: 0,
            prev_blank: true,
            first_line: true,
            truncated: false,
        }
    }

    /// Feed one line; returns the previous message when this line starts a new one.
    fn push_line(&mut self, line: &[u8]) -> Option<Completed> {
        let mut done = None;

        if is_mbox_separator(line) {
            if !self.first_line && !self.prev_blank {
                warn!(
                    offset = self.offset,
                    "Found 'From ' separator without preceding blank line"
                );
            }
            done = self.take();
            self.start = self.offset;
            self.buf.extend_from_slice(line);
        } else if self.buf.len() + line.len() <= self.max_message_size {
            self.buf.extend_from_slice(line);
        } else if !self.truncated {
            warn!(
                offset = self.start,
                max_size = self.max_message_size,
                "Message exceeds maximum size, truncating body"
            );
            self.truncated = true;
        }

        self.prev_blank = is_blank_line(line);
        self.first_line = false;
        self.offset += line.len() as u64;
        done
    }

    fn finish(&mut self) -> Option<Completed> {
        self.take()
    }

    fn take(&mut self) -> Option<Completed> {
        self.truncated = false;
        if self.buf.is_empty() {
            return None;
        }
        Some(Completed {
            index: self.delivered,
            offset: self.start,
            raw: std::mem::take(&mut self.buf),
        })
    }
}

/// Whether a line is an MBOX separator (`From ` at the start, BOM allowed).
fn is_mbox_separator(line: &[u8]) -> bool {
    let line = line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line);
    line.starts_with(b"From ")
}

/// Whether a line holds nothing but whitespace and line endings.
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}
