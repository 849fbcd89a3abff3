//! Incremental `text/event-stream` decoder.
//!
//! Bytes arrive in arbitrary chunks; [`SseParser::push`] buffers partial
//! lines and returns every event completed by the chunk.

use std::borrow::Cow;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Longest unterminated line kept in memory. Anything longer is discarded up
/// to the next line terminator.
pub const MAX_LINE_LEN: usize = 1 << 20;

/// A dispatched server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    /// Last event id seen on the stream when this event was dispatched.
    /// Informational only: the client never reconnects, so it is never sent
    /// back as `Last-Event-ID`.
    pub id: Option<String>,
}

impl SseEvent {
    /// Event type, `"message"` when the server did not name one.
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    bom_checked: bool,
    // Previous chunk ended in CR; a leading LF belongs to that line ending.
    skip_lf: bool,
    discard_line: bool,
    event: Option<String>,
    data: String,
    has_data: bool,
    last_event_id: Option<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent `id` field. Informational, see [`SseEvent::id`].
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    pub fn push(&mut self, mut chunk: &[u8]) -> Vec<SseEvent> {
        if self.skip_lf && !chunk.is_empty() {
            self.skip_lf = false;
            if chunk[0] == b'\n' {
                chunk = &chunk[1..];
            }
        }
        self.buffer.extend_from_slice(chunk);

        if !self.bom_checked {
            if self.buffer.len() < UTF8_BOM.len() && UTF8_BOM.starts_with(&self.buffer) {
                return Vec::new();
            }
            if self.buffer.starts_with(UTF8_BOM) {
                self.buffer.drain(..UTF8_BOM.len());
            }
            self.bom_checked = true;
        }

        let mut buffer = std::mem::take(&mut self.buffer);
        let mut events = Vec::new();
        let mut start = 0;
        let mut i = 0;

        while i < buffer.len() {
            let next = match buffer[i] {
                b'\n' => i + 1,
                b'\r' => match buffer.get(i + 1) {
                    Some(b'\n') => i + 2,
                    Some(_) => i + 1,
                    None => {
                        self.skip_lf = true;
                        i + 1
                    }
                },
                _ => {
                    i += 1;
                    continue;
                }
            };

            if self.discard_line {
                self.discard_line = false;
            } else if let Some(event) = self.process_line(&buffer[start..i]) {
                events.push(event);
            }
            start = next;
            i = next;
        }

        buffer.drain(..start);
        if buffer.len() > MAX_LINE_LEN {
            tracing::warn!("Discarding event stream line longer than {} bytes", MAX_LINE_LEN);
            buffer.clear();
            self.discard_line = true;
        }
        self.buffer = buffer;
        events
    }

    fn process_line(&mut self, raw: &[u8]) -> Option<SseEvent> {
        if raw.is_empty() {
            return self.dispatch();
        }

        let line = String::from_utf8_lossy(raw);
        if let Cow::Owned(_) = line {
            tracing::warn!("Invalid UTF-8 in event stream, decoding lossily");
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.find(':') {
            Some(pos) => {
                let value = &line[pos + 1..];
                (&line[..pos], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (&line[..], ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            // `retry` only matters for reconnection, which this client never does.
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if !self.has_data {
            return None;
        }
        self.has_data = false;

        Some(SseEvent {
            event: event.filter(|e| !e.is_empty()),
            data: std::mem::take(&mut self.data),
            id: self.last_event_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_message() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: {\"x\":1}\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "message");
        assert_eq!(events[0].data, "{\"x\":1}");
    }

    #[test]
    fn test_named_event_and_id() {
        let mut parser = SseParser::new();
        let events = parser.push(b"event: error\nid: 7\ndata: {}\n\n");

        assert_eq!(events[0].event_type(), "error");
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(parser.last_event_id(), Some("7"));
    }

    #[test]
    fn test_event_type_resets_after_dispatch() {
        let mut parser = SseParser::new();
        let events = parser.push(b"event: error\ndata: a\n\ndata: b\n\n");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), "error");
        assert_eq!(events[1].event_type(), "message");
    }

    #[test]
    fn test_multiline_data() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: line one\ndata: line two\n\n");

        assert_eq!(events[0].data, "line one\nline two");
    }

    #[test]
    fn test_chunk_split_mid_line() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"da").is_empty());
        assert!(parser.push(b"ta: {\"s\":").is_empty());
        assert!(parser.push(b"1}\n").is_empty());

        let events = parser.push(b"\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"s\":1}");
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: a\r").is_empty());

        let events = parser.push(b"\n\r");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "a");

        assert!(parser.push(b"\n").is_empty());
        assert_eq!(parser.push(b"data: b\n\n").len(), 1);
    }

    #[test]
    fn test_trailing_cr_dispatches_immediately() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: a\r\r");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "a");
    }

    #[test]
    fn test_lf_after_split_crlf_is_not_a_blank_line() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: a\r").is_empty());
        assert!(parser.push(b"\n").is_empty());

        let events = parser.push(b"\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "a");
    }

    #[test]
    fn test_oversized_line_discarded() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: ").is_empty());
        assert!(parser.push(&vec![b'x'; MAX_LINE_LEN]).is_empty());
        assert!(parser.buffer.is_empty());

        assert!(parser.push(b"xxx\n\n").is_empty());
        let events = parser.push(b"data: ok\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "ok");
    }

    #[test]
    fn test_cr_only_line_endings() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: a\r\rdata: b\r\r");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "a");
        assert_eq!(events[1].data, "b");
    }

    #[test]
    fn test_comments_and_unknown_fields_ignored() {
        let mut parser = SseParser::new();
        let events = parser.push(b": keep-alive\nretry: 3000\nfoo: bar\ndata: ok\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "ok");
    }

    #[test]
    fn test_no_data_no_dispatch() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"event: ping\n\n").is_empty());
        assert!(parser.push(b": comment only\n\n").is_empty());
    }

    #[test]
    fn test_field_without_colon() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "");
    }

    #[test]
    fn test_value_without_space() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data:{\"a\":true}\n\n");

        assert_eq!(events[0].data, "{\"a\":true}");
    }

    #[test]
    fn test_leading_bom_stripped() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"\xEF\xBB").is_empty());

        let events = parser.push(b"\xBFdata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_id_with_nul_ignored() {
        let mut parser = SseParser::new();
        parser.push(b"id: 1\ndata: a\n\nid: 2\0\ndata: b\n\n");

        assert_eq!(parser.last_event_id(), Some("1"));
    }
}
