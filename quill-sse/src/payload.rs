//! Pulling payload text out of frames and unwrapping JSON payloads.

use quill_types::{ChatError, PayloadFormat};
use serde_json::Value;

/// Payload value that marks the end of the stream and carries no text.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &str = "data:";

/// Whether a `Content-Type` header value declares an event stream.
pub fn is_event_stream(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("text/event-stream"))
}

/// Whether a `Content-Type` header value declares a JSON document.
pub fn is_json(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"))
}

/// Extract the payload of one event-stream frame.
///
/// Comment lines (leading `:`) and non-`data` fields are skipped. Each
/// `data:` value is trimmed; empty values and the sentinel are dropped; the
/// rest are joined with `\n`. Returns `None` when nothing is left.
pub fn extract_frame(frame: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for line in frame.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.starts_with(':') {
            continue;
        }
        if let Some(data) = line.strip_prefix(DATA_PREFIX) {
            let data = data.trim();
            if data.is_empty() || data == DONE_SENTINEL {
                continue;
            }
            parts.push(data);
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

/// Extract the payload of a raw (non event-stream) body held in one piece.
///
/// Stray `data:` prefixes are stripped line by line and sentinel lines are
/// dropped. All other text, whitespace included, is kept as sent. See
/// [`RawExtractor`] for a body that arrives in chunks.
pub fn extract_raw(text: &str) -> Option<String> {
    let mut raw = RawExtractor::new();
    let mut out = raw.push(text);
    out.push_str(&raw.finish());
    if out.is_empty() { None } else { Some(out) }
}

/// Incremental [`extract_raw`] for a body read chunk by chunk.
///
/// `data:` stripping and sentinel dropping only apply at the start of a
/// line. A line start that could still grow into either is held back until
/// the next chunk settles it, so the output never depends on where the
/// transport cut the body. A dropped sentinel line takes one adjacent line
/// break with it.
#[derive(Debug, Default)]
pub struct RawExtractor {
    line: String,
    mid_line: bool,
    owed_newline: bool,
}

impl RawExtractor {
    /// Create an extractor at the start of a body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take decoded text and return the payload text it settles.
    pub fn push(&mut self, text: &str) -> String {
        let mut out = String::new();
        let mut rest = text;
        while !rest.is_empty() {
            let (segment, terminated) = match rest.find('\n') {
                Some(i) => {
                    let segment = &rest[..i];
                    rest = &rest[i + 1..];
                    (segment, true)
                }
                None => (std::mem::take(&mut rest), false),
            };

            if self.mid_line {
                out.push_str(segment);
                if terminated {
                    self.mid_line = false;
                    self.owed_newline = true;
                }
                continue;
            }

            self.line.push_str(segment);
            if terminated {
                self.settle_line(true, &mut out);
            } else if !could_become_marker(&self.line) {
                let line = std::mem::take(&mut self.line);
                self.emit_line_start(strip_data_prefix(&line), &mut out);
                self.mid_line = true;
            }
        }
        out
    }

    /// Flush the held line and any trailing line break at end of body.
    pub fn finish(&mut self) -> String {
        let mut out = String::new();
        if !self.line.is_empty() {
            self.settle_line(false, &mut out);
        }
        if std::mem::take(&mut self.owed_newline) {
            out.push('\n');
        }
        self.mid_line = false;
        out
    }

    fn settle_line(&mut self, terminated: bool, out: &mut String) {
        let line = std::mem::take(&mut self.line);
        if is_sentinel_line(&line) {
            if !terminated {
                self.owed_newline = false;
            }
            return;
        }
        self.emit_line_start(strip_data_prefix(&line), out);
        if terminated {
            self.owed_newline = true;
        }
    }

    fn emit_line_start(&mut self, text: &str, out: &mut String) {
        if std::mem::take(&mut self.owed_newline) {
            out.push('\n');
        }
        out.push_str(text);
    }
}

fn strip_data_prefix(line: &str) -> &str {
    match line.trim_start().strip_prefix(DATA_PREFIX) {
        Some(rest) => rest.trim_start(),
        None => line,
    }
}

fn is_sentinel_line(line: &str) -> bool {
    strip_data_prefix(line).trim() == DONE_SENTINEL
}

/// Whether more text could still turn this line start into a `data:`
/// prefix or the sentinel.
fn could_become_marker(line: &str) -> bool {
    let head = line.trim_start();
    if DATA_PREFIX.starts_with(head) {
        return true;
    }
    let rest = head.strip_prefix(DATA_PREFIX).map_or(head, str::trim_start);
    DONE_SENTINEL.starts_with(rest) || rest.trim_end() == DONE_SENTINEL
}

/// Turn an extracted payload into the text to append.
///
/// Text that is not JSON is returned unchanged in both formats. For JSON
/// payloads:
///
/// | Payload | `Strict` | `Lenient` |
/// |---------|----------|-----------|
/// | `"text"` | `text` | `text` |
/// | `{"content": "text"}` | `text` | `text` |
/// | `{"delta": {"content": ..}}`, `{"choices": [{"delta": {"content": ..}}]}`, `{"text": ..}` | error | unwrapped |
/// | any other object or array | error | raw payload |
/// | number, bool, null | raw payload | raw payload |
pub fn decode_payload(payload: &str, format: PayloadFormat) -> Result<String, ChatError> {
    let value: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(_) => return Ok(payload.to_string()),
    };

    if let Value::String(s) = value {
        return Ok(s);
    }
    if !matches!(value, Value::Object(_) | Value::Array(_)) {
        return Ok(payload.to_string());
    }

    match format {
        PayloadFormat::Strict => value
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ChatError::InvalidPayload(truncate_for_error(payload))),
        PayloadFormat::Lenient => Ok(lenient_content(&value)
            .map(str::to_string)
            .unwrap_or_else(|| payload.to_string())),
    }
}

/// Known content locations, tried in order.
fn lenient_content(value: &Value) -> Option<&str> {
    value
        .get("content")
        .and_then(Value::as_str)
        .or_else(|| value.pointer("/delta/content").and_then(Value::as_str))
        .or_else(|| {
            value
                .pointer("/choices/0/delta/content")
                .and_then(Value::as_str)
        })
        .or_else(|| value.get("text").and_then(Value::as_str))
}

fn truncate_for_error(payload: &str) -> String {
    const MAX: usize = 120;
    if payload.chars().count() <= MAX {
        payload.to_string()
    } else {
        let mut s: String = payload.chars().take(MAX).collect();
        s.push('…');
        s
    }
}
