//! Server-Sent Events (SSE) processing for streaming completions.
//!
//! This module converts the raw byte stream of a llama.cpp-compatible
//! `/completion` response into a stream of [`CompletionChunk`]s, handling
//! SSE parsing, buffering across network reads, and error payloads.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::types::CompletionChunk;
use crate::{Error, Result};

/// Process a stream of bytes into a stream of completion chunks.
///
/// Events are separated by blank lines.  Comment lines (`:`) and events
/// without a `data:` field are skipped.  A `[DONE]` sentinel is reported as a
/// terminating chunk.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<CompletionChunk>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    let buffer: Vec<u8> = Vec::new();

    stream::unfold(
        (stream, buffer),
        move |(mut stream, mut buffer)| async move {
            loop {
                if let Some(event) = extract_event(&mut buffer) {
                    match event {
                        Some(event) => return Some((event, (stream, buffer))),
                        None => continue,
                    }
                }

                match stream.next().await {
                    Some(Ok(bytes)) => {
                        // Text is decoded per event, so a character split across reads is fine.
                        buffer.extend_from_slice(&bytes);
                        strip_carriage_returns(&mut buffer);
                    }
                    Some(Err(e)) => {
                        return Some((Err(e), (stream, buffer)));
                    }
                    None => {
                        // A final event may arrive without its trailing blank line.
                        let tail = std::mem::take(&mut buffer);
                        if tail.iter().any(|b| !b.is_ascii_whitespace()) {
                            if let Some(event) = decode_event(&tail) {
                                return Some((event, (stream, buffer)));
                            }
                        }
                        return None;
                    }
                }
            }
        },
    )
}

/// Drop every `\r` that precedes a `\n`.
///
/// A trailing `\r` is kept until the next read shows what follows it.
fn strip_carriage_returns(buffer: &mut Vec<u8>) {
    if !buffer.contains(&b'\r') {
        return;
    }
    let mut normalized = Vec::with_capacity(buffer.len());
    let mut bytes = buffer.iter().copied().peekable();
    while let Some(b) = bytes.next() {
        if b == b'\r' && bytes.peek() == Some(&b'\n') {
            continue;
        }
        normalized.push(b);
    }
    *buffer = normalized;
}

/// Extract a complete SSE event from the front of `buffer`.
///
/// Returns `None` when the buffer does not yet hold a full event, and
/// `Some(None)` for events that carry no data.
fn extract_event(buffer: &mut Vec<u8>) -> Option<Option<Result<CompletionChunk>>> {
    let end = buffer.windows(2).position(|w| w == b"\n\n")?;
    let event: Vec<u8> = buffer.drain(..end + 2).take(end).collect();
    Some(decode_event(&event))
}

fn decode_event(event: &[u8]) -> Option<Result<CompletionChunk>> {
    match std::str::from_utf8(event) {
        Ok(text) => parse_event(text),
        Err(e) => Some(Err(Error::encoding(
            format!("Invalid UTF-8 in stream: {e}"),
            Some(Box::new(e)),
        ))),
    }
}

/// Parse the text of one event.
fn parse_event(event_text: &str) -> Option<Result<CompletionChunk>> {
    let mut data: Option<String> = None;
    let mut is_error_event = false;
    for line in event_text.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(payload) = line.strip_prefix("data:") {
            let payload = payload.trim();
            match &mut data {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(payload);
                }
                None => data = Some(payload.to_string()),
            }
        } else if let Some(payload) = line.strip_prefix("error:") {
            is_error_event = true;
            data = Some(payload.trim().to_string());
        } else if line.trim() == "event: error" {
            is_error_event = true;
        }
    }

    let data = data?;
    if data == "[DONE]" {
        return Some(Ok(CompletionChunk::end()));
    }
    if is_error_event {
        return Some(Err(error_from_payload(&data)));
    }
    Some(parse_chunk(&data))
}

fn parse_chunk(data: &str) -> Result<CompletionChunk> {
    let chunk = serde_json::from_str::<CompletionChunk>(data).map_err(|e| {
        Error::serialization(
            format!("Failed to parse event JSON: {e}"),
            Some(Box::new(e)),
        )
    })?;
    if let Some(error) = &chunk.error {
        return Err(Error::api(error.code.unwrap_or(500), error.message.clone()));
    }
    Ok(chunk)
}

fn error_from_payload(data: &str) -> Error {
    match serde_json::from_str::<CompletionChunk>(data) {
        Ok(CompletionChunk {
            error: Some(error), ..
        }) => Error::api(error.code.unwrap_or(500), error.message),
        _ => Error::streaming(format!("Server reported an error: {data}"), None),
    }
}
