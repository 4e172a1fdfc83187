//! Incremental decoder for chat-completion server-sent events.
//!
//! Network chunks may split a line (or a multi-byte character) anywhere, so
//! bytes are buffered until a full `\n`-terminated line is available. Only
//! `data:` lines are meaningful; `data: [DONE]` ends the reply.

use serde::Deserialize;
use tracing::warn;

const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A non-empty piece of reply text
    Delta(String),
    /// Explicit end-of-stream from the provider
    Done,
    /// A `data:` payload that could not be parsed
    Malformed,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk and return every event completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing line that was never newline-terminated
    pub fn finish(&mut self) -> Option<SseEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        parse_line(&line)
    }
}

fn parse_line(raw: &[u8]) -> Option<SseEvent> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches(['\r', '\n']);

    let data = line.strip_prefix("data:")?.trim_start();
    if data.is_empty() {
        return None;
    }
    if data == DONE_MARKER {
        return Some(SseEvent::Done);
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta)
            .and_then(|d| d.content)
            .filter(|content| !content.is_empty())
            .map(SseEvent::Delta),
        Err(e) => {
            warn!(error = %e, payload = %data, "Skipping malformed stream event");
            Some(SseEvent::Malformed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_line(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": content}}]})
        )
    }

    #[test]
    fn test_decodes_deltas_and_done() {
        let mut decoder = SseDecoder::new();
        let payload = format!("{}{}data: [DONE]\n\n", delta_line("你好，"), delta_line("世界"));
        let events = decoder.push(payload.as_bytes());
        assert_eq!(
            events,
            vec![
                SseEvent::Delta("你好，".into()),
                SseEvent::Delta("世界".into()),
                SseEvent::Done
            ]
        );
    }

    #[test]
    fn test_line_split_across_chunks_and_inside_char() {
        let payload = delta_line("天气不错。");
        let bytes = payload.as_bytes();
        // Split in the middle of a multi-byte character
        let split = payload.find('气').unwrap() + 1;

        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&bytes[..split]).is_empty());
        let events = decoder.push(&bytes[split..]);
        assert_eq!(events, vec![SseEvent::Delta("天气不错。".into())]);
    }

    #[test]
    fn test_malformed_event_reported_not_fatal() {
        let mut decoder = SseDecoder::new();
        let payload = format!("data: {{not json\n{}", delta_line("ok"));
        let events = decoder.push(payload.as_bytes());
        assert_eq!(events, vec![SseEvent::Malformed, SseEvent::Delta("ok".into())]);
    }

    #[test]
    fn test_ignores_comments_role_chunks_and_blank_lines() {
        let mut decoder = SseDecoder::new();
        let payload = concat!(
            ": keep-alive\n",
            "\n",
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n",
            "data: {\"choices\":[]}\n",
            "event: ping\n",
        );
        assert!(decoder.push(payload.as_bytes()).is_empty());
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish(), Some(SseEvent::Done));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_crlf_lines() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: [DONE]\r\n");
        assert_eq!(events, vec![SseEvent::Done]);
    }
}
