//! Incremental decoding of server-sent-events response bodies.
//!
//! The byte stream from the HTTP client arrives in arbitrary chunks; this
//! module buffers them (UTF-8-safely, since a chunk boundary can split a
//! multi-byte character), splits complete events on blank lines, and hands
//! each event to a caller-supplied parser.

use std::pin::Pin;

use anyhow::Result;
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};

const EVENT_DELIMITER: &str = "\n\n";

/// Turn an SSE response body into a stream of parsed items.
///
/// The parser receives one full event at a time and may produce an item,
/// skip the event (`Ok(None)`), or fail it.
pub(crate) fn create_sse_stream<T, F>(
    response: reqwest::Response,
    parser: F,
) -> Pin<Box<dyn Stream<Item = Result<T>> + Send>>
where
    T: Send + 'static,
    F: Fn(&str) -> Result<Option<T>> + Send + 'static,
{
    let stream = response
        .bytes_stream()
        .scan(EventBuffer::default(), move |buffer, chunk| {
            let results = handle_chunk(buffer, chunk, &parser);
            async move { Some(results) }
        })
        .flat_map(futures::stream::iter);

    Box::pin(stream)
}

fn handle_chunk<T, F>(
    buffer: &mut EventBuffer,
    chunk: Result<Bytes, reqwest::Error>,
    parser: &F,
) -> Vec<Result<T>>
where
    F: Fn(&str) -> Result<Option<T>>,
{
    let bytes = match chunk {
        Ok(bytes) => bytes,
        Err(e) => return vec![Err(anyhow::Error::new(e).context("Stream read failed"))],
    };

    buffer.feed(&bytes);

    let mut results = Vec::new();
    while let Some(event) = buffer.next_event() {
        match parser(&event) {
            Ok(Some(item)) => results.push(Ok(item)),
            Ok(None) => {}
            Err(e) => results.push(Err(e)),
        }
    }
    results
}

#[derive(Default)]
struct EventBuffer {
    text: String,
    partial_utf8: Vec<u8>,
}

impl EventBuffer {
    fn feed(&mut self, bytes: &[u8]) {
        self.partial_utf8.extend_from_slice(bytes);
        let valid_len = match std::str::from_utf8(&self.partial_utf8) {
            Ok(_) => self.partial_utf8.len(),
            Err(e) => e.valid_up_to(),
        };
        if valid_len == 0 {
            return;
        }
        let valid = String::from_utf8_lossy(&self.partial_utf8[..valid_len]);
        self.text.push_str(&valid);
        self.partial_utf8.drain(..valid_len);
    }

    fn next_event(&mut self) -> Option<String> {
        let pos = self.text.find(EVENT_DELIMITER)?;
        let end = pos + EVENT_DELIMITER.len();
        let event = self.text[..end].to_string();
        self.text.drain(..end);
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_split_on_blank_line() {
        let mut buffer = EventBuffer::default();
        buffer.feed(b"data: one\n\ndata: two\n\n");

        assert_eq!(buffer.next_event().unwrap(), "data: one\n\n");
        assert_eq!(buffer.next_event().unwrap(), "data: two\n\n");
        assert!(buffer.next_event().is_none());
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut buffer = EventBuffer::default();
        buffer.feed(b"data: hel");
        assert!(buffer.next_event().is_none());
        buffer.feed(b"lo\n\n");
        assert_eq!(buffer.next_event().unwrap(), "data: hello\n\n");
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let mut buffer = EventBuffer::default();
        let bytes = "data: héllo\n\n".as_bytes();
        // Split in the middle of the two-byte 'é'.
        let split = bytes.iter().position(|&b| b == 0xc3).unwrap() + 1;
        buffer.feed(&bytes[..split]);
        assert!(buffer.next_event().is_none());
        buffer.feed(&bytes[split..]);
        assert_eq!(buffer.next_event().unwrap(), "data: héllo\n\n");
    }

    #[test]
    fn test_incomplete_event_stays_buffered() {
        let mut buffer = EventBuffer::default();
        buffer.feed(b"data: pending\n");
        assert!(buffer.next_event().is_none());
        buffer.feed(b"\n");
        assert_eq!(buffer.next_event().unwrap(), "data: pending\n\n");
    }
}
