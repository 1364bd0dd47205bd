//! Server-sent event framing.
//!
//! Turns the raw byte chunks of a `text/event-stream` response into
//! complete events. Chunk boundaries are arbitrary: a line, or a multi-byte
//! UTF-8 sequence, may be split across two chunks.
//!
//! Supported subset of the framing rules:
//! - lines end in `\n` or `\r\n`
//! - a blank line dispatches the pending event, if it has any data
//! - `:`-prefixed lines are comments (keep-alives)
//! - `data:` lines accumulate, joined with `\n`
//! - `event:` names the event; `id:` and `retry:` are accepted and ignored
//!
//! An event left incomplete when the stream ends is discarded.
//!
//! A line or an event larger than the size limit is dropped and logged,
//! the same as a malformed message; decoding resumes at the next event.

use tracing::warn;

/// Maximum size of one event, or of one line of it (16 MB).
pub const MAX_EVENT_SIZE: usize = 16 * 1024 * 1024;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if any.
    pub event: Option<String>,
    /// All `data:` lines joined with `\n`.
    pub data: String,
}

impl SseFrame {
    /// Whether this is an unnamed (or explicitly `message`) event, the only
    /// kind the notification relay sends.
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("message"))
    }
}

/// Incremental decoder for a `text/event-stream` body.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
    data_len: usize,
    event: Option<String>,
    max_event_size: usize,
    /// Dropping the rest of an oversized line.
    skip_line: bool,
    /// Dropping the rest of an oversized event.
    skip_event: bool,
    oversized: u64,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_event_size(MAX_EVENT_SIZE)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_event_size(max_event_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            data: Vec::new(),
            data_len: 0,
            event: None,
            max_event_size: max_event_size.max(1),
            skip_line: false,
            skip_event: false,
            oversized: 0,
        }
    }

    /// Feeds one chunk and returns every event it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut chunk = chunk;
        if self.skip_line {
            match chunk.iter().position(|&b| b == b'\n') {
                Some(offset) => {
                    chunk = &chunk[offset + 1..];
                    self.skip_line = false;
                }
                None => return Vec::new(),
            }
        }
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..].iter().position(|&b| b == b'\n') {
            let end = consumed + offset;
            let mut line = &self.buffer[consumed..end];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            let line = String::from_utf8_lossy(line).into_owned();
            consumed = end + 1;

            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        self.buffer.drain(..consumed);

        if self.buffer.len() > self.max_event_size {
            warn!(
                bytes = self.buffer.len(),
                limit = self.max_event_size,
                "dropping oversized event line"
            );
            self.buffer = Vec::new();
            self.skip_line = true;
            self.discard_event();
        }
        frames
    }

    /// Number of buffered bytes that do not yet form a complete line.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Number of events dropped for exceeding the size limit.
    pub fn oversized_events(&self) -> u64 {
        self.oversized
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            if self.skip_event {
                self.skip_event = false;
                self.event = None;
                return None;
            }
            return self.dispatch();
        }
        if line.starts_with(':') || self.skip_event {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => {
                // Joined length counts one separator per line.
                let len = self.data_len + value.len() + usize::from(!self.data.is_empty());
                if len > self.max_event_size {
                    warn!(
                        bytes = len,
                        limit = self.max_event_size,
                        "dropping oversized event"
                    );
                    self.discard_event();
                } else {
                    self.data.push(value.to_string());
                    self.data_len = len;
                }
            }
            "event" => self.event = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        self.data_len = 0;
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data })
    }

    /// Drops the pending event and everything up to its closing blank line.
    fn discard_event(&mut self) {
        self.data = Vec::new();
        self.data_len = 0;
        self.event = None;
        self.skip_event = true;
        self.oversized += 1;
    }
}
