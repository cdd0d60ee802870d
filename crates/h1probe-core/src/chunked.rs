//! Incremental scanner for the chunked transfer coding
//!
//! The decoder is resumable: it is handed the whole receive buffer plus a
//! cursor, consumes as far as the bytes allow, and picks up from the same
//! state on the next call. Decoded payload accumulates inside the decoder.

/// Longest chunk-size line (including extensions) tolerated before giving up.
const MAX_SIZE_LINE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("invalid chunk size {0:?}")]
    InvalidSize(String),
    #[error("chunk size line longer than {MAX_SIZE_LINE} bytes")]
    SizeLineTooLong,
    #[error("chunk data not followed by a line terminator")]
    MissingTerminator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    NeedMore,
    /// Zero chunk and trailer section fully consumed
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Size,
    Data { remaining: usize },
    DataEnd,
    Trailer,
    Finished,
}

#[derive(Debug, Clone)]
pub struct ChunkedDecoder {
    state: State,
    body: Vec<u8>,
    chunks: usize,
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::Size,
            body: Vec::new(),
            chunks: 0,
        }
    }

    /// Number of non-empty chunks seen so far.
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Consume `buf[*cursor..]` as far as possible, advancing `cursor`.
    ///
    /// # Errors
    ///
    /// Returns an error on a non-hex chunk size or a chunk whose data is not
    /// followed by CRLF (or bare LF). The decoder should not be reused after.
    pub fn advance(&mut self, buf: &[u8], cursor: &mut usize) -> Result<ChunkStatus, ChunkError> {
        loop {
            match self.state {
                State::Finished => return Ok(ChunkStatus::Done),
                State::Size => {
                    let Some((line, next)) = next_line(buf, *cursor) else {
                        if buf.len() - *cursor > MAX_SIZE_LINE {
                            return Err(ChunkError::SizeLineTooLong);
                        }
                        return Ok(ChunkStatus::NeedMore);
                    };
                    let size = parse_size(line)?;
                    *cursor = next;
                    self.state = if size == 0 {
                        State::Trailer
                    } else {
                        self.chunks += 1;
                        State::Data { remaining: size }
                    };
                }
                State::Data { remaining } => {
                    let available = buf.len() - *cursor;
                    if available == 0 {
                        return Ok(ChunkStatus::NeedMore);
                    }
                    let take = available.min(remaining);
                    self.body.extend_from_slice(&buf[*cursor..*cursor + take]);
                    *cursor += take;
                    self.state = if take == remaining {
                        State::DataEnd
                    } else {
                        State::Data {
                            remaining: remaining - take,
                        }
                    };
                }
                State::DataEnd => match (buf.get(*cursor), buf.get(*cursor + 1)) {
                    (None, _) | (Some(b'\r'), None) => return Ok(ChunkStatus::NeedMore),
                    (Some(b'\n'), _) => {
                        *cursor += 1;
                        self.state = State::Size;
                    }
                    (Some(b'\r'), Some(b'\n')) => {
                        *cursor += 2;
                        self.state = State::Size;
                    }
                    _ => return Err(ChunkError::MissingTerminator),
                },
                State::Trailer => {
                    let Some((line, next)) = next_line(buf, *cursor) else {
                        return Ok(ChunkStatus::NeedMore);
                    };
                    *cursor = next;
                    if line.is_empty() {
                        self.state = State::Finished;
                    }
                }
            }
        }
    }
}

/// Line starting at `from`, without its terminator, and the offset after it.
fn next_line(buf: &[u8], from: usize) -> Option<(&[u8], usize)> {
    let offset = buf[from..].iter().position(|&b| b == b'\n')?;
    let nl = from + offset;
    let line = &buf[from..nl];
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    Some((line, nl + 1))
}

fn parse_size(line: &[u8]) -> Result<usize, ChunkError> {
    let digits = match line.iter().position(|&b| b == b';') {
        Some(ext) => &line[..ext],
        None => line,
    }
    .trim_ascii();

    let invalid = || ChunkError::InvalidSize(String::from_utf8_lossy(line).into_owned());
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_hexdigit) {
        return Err(invalid());
    }
    let text = std::str::from_utf8(digits).map_err(|_| invalid())?;
    usize::from_str_radix(text, 16).map_err(|_| invalid())
}
