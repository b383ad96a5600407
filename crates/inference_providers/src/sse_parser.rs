use crate::{CompletionError, TextDelta};
use bytes::Bytes;
use futures_util::Stream;
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};

const DONE_MARKER: &str = "[DONE]";

/// Turns the payload of one `data:` line into a normalized delta
///
/// Each upstream API nests its text differently; the backend supplies the
/// parser and the byte-level framing stays shared.
pub trait SSEEventParser: Send + Unpin {
    fn parse_event(&mut self, data: &str) -> Result<TextDelta, CompletionError>;
}

/// SSE (Server-Sent Events) stream parser that properly handles buffering
/// of incomplete events across HTTP chunks
///
/// Lines are split on raw bytes and decoded only once complete, so a multi-byte
/// character cut by the network is reassembled. Every event found in one chunk
/// is queued and yielded in order.
pub struct SSEParser<S, P> {
    inner: S,
    parser: P,
    buffer: Vec<u8>,
    pending: VecDeque<Result<TextDelta, CompletionError>>,
    done: bool,
}

impl<S, E, P> SSEParser<S, P>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
    P: SSEEventParser,
{
    pub fn new(stream: S, parser: P) -> Self {
        Self {
            inner: stream,
            parser,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    fn process_buffer(&mut self) {
        while !self.done {
            let Some(newline_pos) = self.buffer.iter().position(|b| *b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            self.process_line(&line);
        }
    }

    fn process_line(&mut self, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with(':') {
            return;
        }

        // Only data lines carry payloads; event/id/retry fields are ignored
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim_start();

        if data == DONE_MARKER {
            self.done = true;
            self.buffer.clear();
            return;
        }

        let event = self.parser.parse_event(data);
        self.pending.push_back(event);
    }
}

impl<S, E, P> Stream for SSEParser<S, P>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
    P: SSEEventParser,
{
    type Item = Result<TextDelta, CompletionError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(event));
            }
            if this.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.buffer.extend_from_slice(&bytes);
                    this.process_buffer();
                }
                Poll::Ready(Some(Err(e))) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(CompletionError::CompletionError(
                        e.to_string(),
                    ))));
                }
                Poll::Ready(None) => {
                    // A final event without a trailing newline is still an event
                    if !this.buffer.is_empty() {
                        let rest = std::mem::take(&mut this.buffer);
                        this.process_line(&rest);
                    }
                    this.done = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{stream, StreamExt};

    struct EchoParser;

    impl SSEEventParser for EchoParser {
        fn parse_event(&mut self, data: &str) -> Result<TextDelta, CompletionError> {
            if data == "boom" {
                return Err(CompletionError::InvalidResponse(data.to_string()));
            }
            Ok(TextDelta::text(data))
        }
    }

    async fn collect(chunks: Vec<Result<&'static [u8], String>>) -> Vec<Result<TextDelta, CompletionError>> {
        let inner = stream::iter(
            chunks
                .into_iter()
                .map(|c| c.map(Bytes::from_static))
                .collect::<Vec<_>>(),
        );
        SSEParser::new(inner, EchoParser).collect().await
    }

    fn ok(bytes: &'static [u8]) -> Result<&'static [u8], String> {
        Ok(bytes)
    }

    fn texts(events: &[Result<TextDelta, CompletionError>]) -> Vec<String> {
        events
            .iter()
            .map(|e| e.as_ref().unwrap().fragment().unwrap_or_default().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_multiple_events_in_one_chunk_are_all_yielded() {
        let events = collect(vec![ok(b"data: a\n\ndata: b\n\ndata: c\n\n")]).await;
        assert_eq!(texts(&events), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_event_split_across_chunks() {
        let events = collect(vec![ok(b"data: hel"), ok(b"lo\n"), ok(b"\n")]).await;
        assert_eq!(texts(&events), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_multibyte_character_split_across_chunks() {
        // "é" is 0xC3 0xA9
        let events = collect(vec![ok(b"data: caf\xC3"), ok(b"\xA9\n\n")]).await;
        assert_eq!(texts(&events), vec!["café"]);
    }

    #[tokio::test]
    async fn test_done_marker_ends_stream() {
        let events = collect(vec![ok(b"data: a\n\ndata: [DONE]\n\ndata: late\n\n")]).await;
        assert_eq!(texts(&events), vec!["a"]);
    }

    #[tokio::test]
    async fn test_comments_and_prefix_without_space() {
        let events = collect(vec![ok(b": keep-alive\r\n\r\ndata:x\r\n\r\nevent: ping\n\n")]).await;
        assert_eq!(texts(&events), vec!["x"]);
    }

    #[tokio::test]
    async fn test_trailing_event_without_newline_is_flushed() {
        let events = collect(vec![ok(b"data: a\n\ndata: b")]).await;
        assert_eq!(texts(&events), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let events = collect(vec![
            ok(b"data: a\n\n"),
            Err("connection reset".to_string()),
            ok(b"data: b\n\n"),
        ])
        .await;

        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert_eq!(
            events[1],
            Err(CompletionError::CompletionError("connection reset".to_string()))
        );
    }

    #[tokio::test]
    async fn test_event_parse_error_is_yielded() {
        let events = collect(vec![ok(b"data: boom\n\n")]).await;
        assert!(matches!(events[0], Err(CompletionError::InvalidResponse(_))));
    }
}
