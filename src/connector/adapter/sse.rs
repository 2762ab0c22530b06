//! Server-sent events parsing for streamed provider responses.

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use std::fmt::Display;
use std::pin::Pin;

use crate::domain::DomainError;

/// Largest single event accepted from the provider.
pub const MAX_EVENT_BYTES: usize = 4 * 1024 * 1024;

struct SseState<E> {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, E>> + Send>>,
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for a delimiter.
    scanned: usize,
    limit: usize,
    done: bool,
}

/// Turn an HTTP byte stream into the `data` payloads of its events.
///
/// Bytes are buffered until a blank line closes an event, so events and
/// multi-byte characters split across network reads are reassembled. Events
/// without `data` lines (comments, keep-alives) are skipped. A transport error
/// is yielded once and ends the stream, as is an event larger than
/// [`MAX_EVENT_BYTES`].
pub fn sse_data_events<S, E>(byte_stream: S) -> impl Stream<Item = Result<String, DomainError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    sse_data_events_with_limit(byte_stream, MAX_EVENT_BYTES)
}

fn sse_data_events_with_limit<S, E>(
    byte_stream: S,
    limit: usize,
) -> impl Stream<Item = Result<String, DomainError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = SseState {
        inner: Box::pin(byte_stream),
        buffer: Vec::new(),
        scanned: 0,
        limit,
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = take_event(&mut state.buffer, &mut state.scanned) {
                match event_data(&event) {
                    Some(data) => return Some((Ok(data), state)),
                    None => continue,
                }
            }

            if !state.done && state.buffer.len() > state.limit {
                let size = state.buffer.len();
                state.done = true;
                state.buffer.clear();
                return Some((
                    Err(DomainError::provider(format!(
                        "SSE event exceeds {} bytes ({size} buffered without a delimiter)",
                        state.limit
                    ))),
                    state,
                ));
            }

            if state.done {
                // The last event may arrive without a terminating blank line.
                let rest = std::mem::take(&mut state.buffer);
                return event_data(&rest).map(|data| (Ok(data), state));
            }

            match state.inner.next().await {
                Some(Ok(bytes)) => state.buffer.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    state.done = true;
                    state.buffer.clear();
                    return Some((
                        Err(DomainError::provider(format!("Error in HTTP stream: {e}"))),
                        state,
                    ));
                }
                None => state.done = true,
            }
        }
    })
}

/// Remove the first complete event from `buffer`, without its delimiter.
///
/// Only bytes past `scanned` (less a delimiter's length of overlap) are
/// searched, so a large event arriving in small reads is scanned once.
fn take_event(buffer: &mut Vec<u8>, scanned: &mut usize) -> Option<Vec<u8>> {
    let start = scanned.saturating_sub(3);
    let window = &buffer[start..];
    let lf = find(window, b"\n\n").map(|i| (start + i, 2));
    let crlf = find(window, b"\r\n\r\n").map(|i| (start + i, 4));

    let (end, delimiter_len) = match (lf, crlf) {
        (Some(a), Some(b)) => {
            if a.0 <= b.0 {
                a
            } else {
                b
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => {
            *scanned = buffer.len();
            return None;
        }
    };

    let event = buffer[..end].to_vec();
    buffer.drain(..end + delimiter_len);
    *scanned = 0;
    Some(event)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Join the `data:` lines of one event, or `None` if it has none.
fn event_data(event: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(event);
    let mut data: Option<String> = None;

    for line in text.split('\n') {
        let line = line.trim_end_matches('\r');
        let Some(value) = line.strip_prefix("data:") else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(chunks: Vec<Result<&'static [u8], &'static str>>) -> Vec<Result<String, String>> {
        let byte_stream = stream::iter(
            chunks
                .into_iter()
                .map(|c| c.map(Bytes::from_static))
                .collect::<Vec<_>>(),
        );
        sse_data_events(byte_stream)
            .map(|r| r.map_err(|e| e.to_string()))
            .collect()
            .await
    }

    #[tokio::test]
    async fn parses_events_split_across_reads() {
        let events = collect(vec![
            Ok(b"data: {\"a\"".as_slice()),
            Ok(b":1}\n\nda".as_slice()),
            Ok(b"ta: {\"b\":2}\n\n".as_slice()),
        ])
        .await;

        assert_eq!(
            events,
            vec![Ok("{\"a\":1}".to_string()), Ok("{\"b\":2}".to_string())]
        );
    }

    #[tokio::test]
    async fn handles_crlf_delimiters() {
        let events = collect(vec![Ok(b"data: one\r\n\r\ndata: two\r\n\r\n".as_slice())]).await;
        assert_eq!(events, vec![Ok("one".to_string()), Ok("two".to_string())]);
    }

    #[tokio::test]
    async fn reassembles_multibyte_characters() {
        // "ż" is 0xC5 0xBC
        let events = collect(vec![Ok(b"data: \xC5".as_slice()), Ok(b"\xBC\n\n".as_slice())]).await;
        assert_eq!(events, vec![Ok("ż".to_string())]);
    }

    #[tokio::test]
    async fn joins_multiline_data_and_skips_comments() {
        let events = collect(vec![Ok(b": keep-alive\n\nevent: x\ndata: a\ndata: b\n\n".as_slice())]).await;
        assert_eq!(events, vec![Ok("a\nb".to_string())]);
    }

    #[tokio::test]
    async fn flushes_trailing_event_without_blank_line() {
        let events = collect(vec![Ok(b"data: first\n\ndata: last".as_slice())]).await;
        assert_eq!(events, vec![Ok("first".to_string()), Ok("last".to_string())]);
    }

    #[tokio::test]
    async fn delimiter_split_across_many_reads() {
        let reads: Vec<Result<&'static [u8], &'static str>> = vec![
            Ok(b"data: lo".as_slice()),
            Ok(b"ng".as_slice()),
            Ok(b"\r".as_slice()),
            Ok(b"\n".as_slice()),
            Ok(b"\r".as_slice()),
            Ok(b"\n".as_slice()),
            Ok(b"data: next\n".as_slice()),
            Ok(b"\n".as_slice()),
        ];

        let events = collect(reads).await;

        assert_eq!(events, vec![Ok("long".to_string()), Ok("next".to_string())]);
    }

    #[test]
    fn scan_offset_resumes_and_resets() {
        let mut buffer = b"data: a\n".to_vec();
        let mut scanned = 0;

        assert!(take_event(&mut buffer, &mut scanned).is_none());
        assert_eq!(scanned, buffer.len());

        buffer.extend_from_slice(b"\ndata: b");
        assert_eq!(take_event(&mut buffer, &mut scanned).as_deref(), Some(b"data: a".as_slice()));
        assert_eq!(scanned, 0);
        assert_eq!(buffer, b"data: b");
    }

    #[tokio::test]
    async fn oversized_event_is_a_provider_error() {
        let byte_stream = stream::iter(vec![
            Ok::<_, &str>(Bytes::from_static(b"data: 0123456789")),
            Ok(Bytes::from_static(b"0123456789")),
            Ok(Bytes::from_static(b"\n\ndata: never\n\n")),
        ]);

        let events: Vec<_> = sse_data_events_with_limit(byte_stream, 16).collect().await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            Err(DomainError::Provider(message)) => assert!(message.contains("exceeds 16 bytes")),
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[tokio::test]
    async fn complete_event_is_taken_before_the_limit_applies() {
        let byte_stream = stream::iter(vec![Ok::<_, &str>(Bytes::from_static(b"data: 0123456789\n\n"))]);

        let events: Vec<_> = sse_data_events_with_limit(byte_stream, 16)
            .map(|r| r.map_err(|e| e.to_string()))
            .collect()
            .await;

        assert_eq!(events, vec![Ok("0123456789".to_string())]);
    }

    #[tokio::test]
    async fn transport_error_ends_the_stream() {
        let events = collect(vec![
            Ok(b"data: ok\n\ndata: partial".as_slice()),
            Err("connection reset"),
            Ok(b"data: never\n\n".as_slice()),
        ])
        .await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0], Ok("ok".to_string()));
        assert!(events[1].as_ref().unwrap_err().contains("connection reset"));
    }
}
