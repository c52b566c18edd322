use serde::Deserialize;
use tracing::warn;

/// Keys that are absent or explicitly `null` both fall back to defaults.
#[derive(Debug, Default, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
}

/// One line of Ollama's `/api/chat` stream.
#[derive(Debug, Default, Deserialize)]
struct WireChunk {
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    done: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamChunk {
    pub content: String,
    pub done: bool,
}

impl From<WireChunk> for StreamChunk {
    fn from(wire: WireChunk) -> Self {
        Self {
            content: wire.message.and_then(|m| m.content).unwrap_or_default(),
            done: wire.done.unwrap_or_default(),
        }
    }
}

/// Decodes one upstream line. Blank or malformed lines yield `None`.
pub fn decode_line(line: &str) -> Option<StreamChunk> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<WireChunk>(line) {
        Ok(wire) => Some(wire.into()),
        Err(e) => {
            warn!(error = %e, "skipping malformed upstream chunk");
            None
        }
    }
}

/// Reassembles newline-delimited lines from arbitrarily split network reads.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// sequences split across reads are decoded intact.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    /// Prefix of `pending` already known to contain no newline.
    scanned: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and returns every line completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = self.pending[from..].iter().position(|b| *b == b'\n') {
            let end = from + offset;
            lines.push(to_line(&self.pending[start..end]));
            start = end + 1;
            from = start;
        }

        self.pending.drain(..start);
        self.scanned = self.pending.len();
        lines
    }

    /// Drains a trailing line that was never newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        self.scanned = 0;
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        Some(to_line(&raw))
    }
}

fn to_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
