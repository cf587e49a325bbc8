//! Splitting decoded text into blank-line delimited frames.

/// Accumulates decoded text and cuts it into frames.
///
/// A frame ends at the leftmost `\n\n` or `\r\n\r\n`. Whatever follows the
/// last boundary stays buffered until more text arrives or the stream ends.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    buf: String,
}

impl FrameSplitter {
    /// Create an empty splitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` and return every frame it completed, in order.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buf.push_str(text);

        let mut frames = Vec::new();
        while let Some((end, sep_len)) = next_boundary(&self.buf) {
            frames.push(self.buf[..end].to_string());
            self.buf.drain(..end + sep_len);
        }
        frames
    }

    /// Take the trailing partial frame at end of stream, if it holds
    /// anything besides whitespace.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        if rest.trim().is_empty() { None } else { Some(rest) }
    }

    /// The text waiting for its boundary.
    pub fn buffered(&self) -> &str {
        &self.buf
    }
}

/// Position and length of the leftmost frame boundary in `buf`.
fn next_boundary(buf: &str) -> Option<(usize, usize)> {
    let lf = buf.find("\n\n").map(|i| (i, 2));
    let crlf = buf.find("\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}
