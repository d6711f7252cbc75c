//! Incremental decoding of an OpenAI-style `text/event-stream` body into
//! content tokens.

use std::collections::VecDeque;

use axum::http::StatusCode;
use bytes::Bytes;
use futures_util::{stream, Stream, StreamExt};
use serde::Deserialize;
use tracing::warn;

use super::client::TokenStream;
use crate::error::AppError;

#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    Data(String),
    Done,
}

/// Splits the byte stream into `data:` payloads. Lines may arrive split
/// across chunks; the unfinished tail is kept until its newline shows up.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(frame) = parse_line(&line[..line.len() - 1]) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flushes a final line that had no trailing newline.
    pub fn finish(&mut self) -> Vec<Frame> {
        let line = std::mem::take(&mut self.buf);
        parse_line(&line).into_iter().collect()
    }
}

fn parse_line(line: &[u8]) -> Option<Frame> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let payload = line.strip_prefix(b"data:")?;
    let payload = payload.strip_prefix(b" ").unwrap_or(payload);
    let text = String::from_utf8_lossy(payload).into_owned();
    if text.trim() == "[DONE]" {
        Some(Frame::Done)
    } else {
        Some(Frame::Data(text))
    }
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Token text carried by one `data:` payload, if any.
fn tokens_in(payload: &str) -> Result<Option<String>, AppError> {
    let chunk: CompletionChunk = match serde_json::from_str(payload) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "skipping undecodable completion chunk");
            return Ok(None);
        }
    };
    if let Some(err) = chunk.error {
        return Err(AppError::Upstream {
            status: StatusCode::BAD_GATEWAY,
            message: err.to_string(),
        });
    }
    let text: String = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.content)
        .collect();
    Ok((!text.is_empty()).then_some(text))
}

struct Relay {
    upstream: stream::BoxStream<'static, Result<Bytes, String>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, AppError>>,
    done: bool,
}

impl Relay {
    fn absorb(&mut self, frames: Vec<Frame>) {
        for frame in frames {
            match frame {
                Frame::Done => {
                    self.done = true;
                    return;
                }
                Frame::Data(payload) => match tokens_in(&payload) {
                    Ok(Some(text)) => self.pending.push_back(Ok(text)),
                    Ok(None) => {}
                    Err(e) => {
                        self.pending.push_back(Err(e));
                        self.done = true;
                        return;
                    }
                },
            }
        }
    }
}

/// Relays tokens as their chunks arrive. Ends at `[DONE]`, at upstream EOF,
/// or after yielding the first error.
pub fn token_stream<S, E>(upstream: S) -> TokenStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + 'static,
{
    let relay = Relay {
        upstream: upstream.map(|r| r.map_err(|e| e.to_string())).boxed(),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(relay, |mut relay| async move {
        loop {
            if let Some(item) = relay.pending.pop_front() {
                return Some((item, relay));
            }
            if relay.done {
                return None;
            }
            match relay.upstream.next().await {
                Some(Ok(chunk)) => {
                    let frames = relay.decoder.push(&chunk);
                    relay.absorb(frames);
                }
                Some(Err(e)) => {
                    relay.done = true;
                    relay.pending.push_back(Err(AppError::Upstream {
                        status: StatusCode::BAD_GATEWAY,
                        message: format!("completion stream interrupted: {e}"),
                    }));
                }
                None => {
                    let frames = relay.decoder.finish();
                    relay.absorb(frames);
                    relay.done = true;
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": content}}]})
        )
    }

    async fn collect(parts: Vec<&'static str>) -> Vec<Result<String, String>> {
        let upstream = stream::iter(
            parts
                .into_iter()
                .map(|p| Ok::<_, std::convert::Infallible>(Bytes::from_static(p.as_bytes()))),
        );
        token_stream(upstream)
            .map(|r| r.map_err(|e| e.to_string()))
            .collect()
            .await
    }

    #[test]
    fn decoder_reassembles_split_lines() {
        let mut d = SseDecoder::default();
        assert!(d.push(b"data: {\"a\"").is_empty());
        assert_eq!(d.push(b":1}\r\n\r\n"), vec![Frame::Data("{\"a\":1}".into())]);
        assert_eq!(d.push(b": keep-alive\n\ndata:[DONE]\n"), vec![Frame::Done]);
    }

    #[test]
    fn decoder_flushes_unterminated_tail() {
        let mut d = SseDecoder::default();
        assert!(d.push(b"data: [DONE]").is_empty());
        assert_eq!(d.finish(), vec![Frame::Done]);
        assert!(d.finish().is_empty());
    }

    #[tokio::test]
    async fn relays_tokens_in_order_and_stops_at_done() {
        let a: &'static str = Box::leak(chunk("Tomato ").into_boxed_str());
        let b: &'static str = Box::leak(chunk("soup").into_boxed_str());
        let after: &'static str = Box::leak(chunk("ignored").into_boxed_str());
        let (b1, b2) = b.split_at(12);

        let out = collect(vec![a, b1, b2, "data: [DONE]\n\n", after]).await;
        assert_eq!(out, vec![Ok("Tomato ".to_string()), Ok("soup".to_string())]);
    }

    #[tokio::test]
    async fn role_only_and_garbage_chunks_are_skipped() {
        let out = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: not-json\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n",
        ])
        .await;
        assert_eq!(out, vec![Ok("hi".to_string())]);
    }

    #[tokio::test]
    async fn upstream_error_payload_ends_stream() {
        let out = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
            "data: {\"error\":{\"message\":\"overloaded\"}}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n",
        ])
        .await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Ok("a".to_string()));
        assert!(out[1].as_ref().unwrap_err().contains("overloaded"));
    }

    #[tokio::test]
    async fn transport_error_is_propagated() {
        let upstream = stream::iter(vec![
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n")),
            Err("connection reset"),
        ]);
        let out: Vec<_> = token_stream(upstream).collect().await;
        assert!(out[0].is_ok());
        assert!(matches!(out[1], Err(AppError::Upstream { .. })));
        assert_eq!(out.len(), 2);
    }
}
