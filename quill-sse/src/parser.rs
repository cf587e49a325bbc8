//! Synchronous byte-to-payload parser.

use quill_types::{ChatError, Framing, PayloadFormat};

use crate::decode::Utf8Decoder;
use crate::frame::FrameSplitter;
use crate::payload::{RawExtractor, decode_payload, extract_frame};

/// Drives decoding, framing and extraction for one response body.
///
/// Feed it chunks in arrival order; each call returns the payloads those
/// bytes completed. Call [`finish`](Self::finish) once the body ends to
/// flush the last partial frame.
///
/// Raw bodies are plain text: only event-stream payloads go through the
/// JSON unwrap, since a raw chunk boundary can fall anywhere.
#[derive(Debug)]
pub struct EventStreamParser {
    framing: Framing,
    format: PayloadFormat,
    decoder: Utf8Decoder,
    splitter: FrameSplitter,
    raw: RawExtractor,
}

impl EventStreamParser {
    /// Create a parser for a body with the given framing.
    pub fn new(framing: Framing, format: PayloadFormat) -> Self {
        Self {
            framing,
            format,
            decoder: Utf8Decoder::new(),
            splitter: FrameSplitter::new(),
            raw: RawExtractor::new(),
        }
    }

    /// The framing this parser was built for.
    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Process one chunk of the body.
    ///
    /// Fails only when an event-stream payload is JSON of a shape the
    /// payload format rejects. Raw bodies never fail.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<String>, ChatError> {
        let mut out = Vec::new();
        self.feed_into(chunk, &mut out)?;
        Ok(out)
    }

    /// Like [`feed`](Self::feed), appending to `out`. Payloads completed
    /// before a rejected one stay in `out` when this fails.
    pub fn feed_into(&mut self, chunk: &[u8], out: &mut Vec<String>) -> Result<(), ChatError> {
        let text = self.decoder.decode(chunk);
        self.process(&text, out)
    }

    /// Flush everything still buffered at end of body.
    pub fn finish(&mut self) -> Result<Vec<String>, ChatError> {
        let mut out = Vec::new();
        self.finish_into(&mut out)?;
        Ok(out)
    }

    /// Like [`finish`](Self::finish), appending to `out`.
    pub fn finish_into(&mut self, out: &mut Vec<String>) -> Result<(), ChatError> {
        let tail = self.decoder.finish();
        self.process(&tail, out)?;
        match self.framing {
            Framing::EventStream => {
                if let Some(frame) = self.splitter.finish() {
                    self.push_frame(&frame, out)?;
                }
            }
            Framing::Raw => push_text(self.raw.finish(), out),
        }
        Ok(())
    }

    fn process(&mut self, text: &str, out: &mut Vec<String>) -> Result<(), ChatError> {
        if text.is_empty() {
            return Ok(());
        }
        match self.framing {
            Framing::EventStream => {
                for frame in self.splitter.push(text) {
                    self.push_frame(&frame, out)?;
                }
            }
            Framing::Raw => push_text(self.raw.push(text), out),
        }
        Ok(())
    }

    fn push_frame(&self, frame: &str, out: &mut Vec<String>) -> Result<(), ChatError> {
        match extract_frame(frame) {
            Some(payload) => self.push_payload(&payload, out),
            None => Ok(()),
        }
    }

    fn push_payload(&self, payload: &str, out: &mut Vec<String>) -> Result<(), ChatError> {
        push_text(decode_payload(payload, self.format)?, out);
        Ok(())
    }
}

fn push_text(text: String, out: &mut Vec<String>) {
    if !text.is_empty() {
        out.push(text);
    }
}
