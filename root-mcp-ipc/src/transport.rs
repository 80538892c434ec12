//! Segmenting of the worker's captured output streams
//!
//! The worker writes everything the executed code prints straight to its
//! stdout and stderr pipes. After each request it emits a boundary line on
//! both streams; on stdout the boundary is followed by the JSON reply. The
//! boundary is preceded by a newline so it always starts a fresh line, and
//! that injected newline is removed again here.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::error::IpcError;

/// Output captured between two boundaries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    /// Captured text, lossily decoded as UTF-8
    pub text: String,
    /// Whatever followed the boundary token on its line
    pub trailer: Option<String>,
    /// The stream hit EOF before a boundary was seen
    pub closed: bool,
}

/// Reads boundary-delimited segments from one captured stream
pub struct SegmentReader<R> {
    reader: BufReader<R>,
    boundary: String,
    finished: bool,
}

impl<R: AsyncRead + Unpin> SegmentReader<R> {
    /// Create a reader that splits `reader` at lines starting with `boundary`
    pub fn new(reader: R, boundary: impl Into<String>) -> Self {
        Self {
            reader: BufReader::new(reader),
            boundary: boundary.into(),
            finished: false,
        }
    }

    /// Read the next segment.
    ///
    /// Returns `Ok(None)` once the stream has been fully consumed.
    pub async fn next_segment(&mut self) -> Result<Option<Segment>, IpcError> {
        if self.finished {
            return Ok(None);
        }

        let mut captured: Vec<u8> = Vec::new();
        let mut line: Vec<u8> = Vec::new();

        loop {
            line.clear();
            let read = self.reader.read_until(b'\n', &mut line).await?;

            if read == 0 {
                self.finished = true;
                if captured.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(Segment {
                    text: String::from_utf8_lossy(&captured).into_owned(),
                    trailer: None,
                    closed: true,
                }));
            }

            if let Some(trailer) = self.match_boundary(&line) {
                if captured.last() == Some(&b'\n') {
                    captured.pop();
                }
                return Ok(Some(Segment {
                    text: String::from_utf8_lossy(&captured).into_owned(),
                    trailer,
                    closed: false,
                }));
            }

            captured.extend_from_slice(&line);
        }
    }

    /// `Some(trailer)` when `line` is a boundary line
    fn match_boundary(&self, line: &[u8]) -> Option<Option<String>> {
        let text = String::from_utf8_lossy(line);
        let text = text.trim_end_matches(['\n', '\r']);
        let rest = text.strip_prefix(self.boundary.as_str())?;

        if rest.is_empty() {
            Some(None)
        } else {
            rest.strip_prefix(' ').map(|trailer| Some(trailer.to_string()))
        }
    }
}
