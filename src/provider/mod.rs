use async_trait::async_trait;
use futures::{stream, Stream, StreamExt, TryStream, TryStreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::cli::ProviderKind;
use crate::config::Config;
use crate::errors::GenError;
use crate::wire::{Instruction, UsageStats};

pub mod openai;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Buffered,
    Streaming,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelResult {
    pub text: String,
    pub usage: Option<UsageStats>,
}

#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Run one chat completion. Streaming replies are fully drained before
    /// this returns; callers never see partial text.
    async fn send(&self, ins: &Instruction, delivery: Delivery) -> Result<ModelResult, GenError>;
}

pub type DynGateway = Arc<dyn ModelGateway>;

pub fn make_gateway(cfg: &Config, api_key: Option<String>) -> anyhow::Result<DynGateway> {
    match cfg.provider {
        ProviderKind::OpenRouter | ProviderKind::OpenAI => Ok(Arc::new(openai::ChatCompletions::new(
            cfg.api_base().to_string(),
            cfg.model.clone(),
            api_key.unwrap_or_default(),
            cfg.timeout_secs,
            cfg.provider == ProviderKind::OpenRouter,
            cfg.site_url.clone(),
            cfg.site_title.clone(),
        )?)),
    }
}

/// One `chat.completion.chunk` from an SSE stream.
#[derive(Debug, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub usage: Option<UsageStats>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
}

/// Error object some gateways send inside a 200 body or as a stream event.
/// `code` is usually the HTTP status, as a number or a string.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    pub fn status(&self) -> Option<u16> {
        let code = match self.code.as_ref()? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        code.and_then(|c| u16::try_from(c).ok())
    }

    pub fn into_error(self) -> GenError {
        let status = self.status();
        let message = self.message.unwrap_or_else(|| "unknown error".to_string());
        GenError::transport(status, format!("model API error in response body: {message}"))
    }
}

/// Splits SSE bytes into `data:` payloads and decodes them. Lines are cut on
/// raw bytes so a multi-byte character split across reads stays intact;
/// partial lines are held until the next feed.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<ChatChunk, GenError>> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(nl) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=nl).collect();
            out.extend(self.decode_line(&line));
        }
        out
    }

    /// Flush an unterminated last line once the byte stream has ended.
    pub fn finish(&mut self) -> Vec<Result<ChatChunk, GenError>> {
        let rest = std::mem::take(&mut self.buffer);
        self.decode_line(&rest).into_iter().collect()
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<Result<ChatChunk, GenError>> {
        if self.done {
            return None;
        }
        let line = match std::str::from_utf8(raw) {
            Ok(l) => l.trim(),
            Err(e) => return Some(Err(GenError::transport(None, format!("stream line is not UTF-8: {e}")))),
        };
        if line.is_empty() || line.starts_with(':') {
            return None;
        }
        let data = line.strip_prefix("data:")?.trim();
        if data == "[DONE]" {
            self.done = true;
            return None;
        }
        let chunk = serde_json::from_str::<ChatChunk>(data)
            .map_err(|e| GenError::transport(None, format!("malformed stream chunk: {e}: {data}")));
        Some(chunk.and_then(|mut c| match c.error.take() {
            Some(err) => Err(err.into_error()),
            None => Ok(c),
        }))
    }
}

/// Decode a byte stream into chunks, flushing the decoder when the bytes run out.
pub fn decode_sse<S, B>(bytes: S) -> impl Stream<Item = Result<ChatChunk, GenError>>
where
    S: Stream<Item = Result<B, GenError>>,
    B: AsRef<[u8]>,
{
    let decoder = Arc::new(Mutex::new(SseDecoder::default()));
    let tail = Arc::clone(&decoder);
    bytes
        .map_ok(move |b| stream::iter(decoder.lock().feed(b.as_ref())))
        .try_flatten()
        .chain(stream::once(async move { stream::iter(tail.lock().finish()) }).flatten())
}

/// Fold a chunk stream into one result: delta fragments concatenated in
/// arrival order, the last reported usage kept.
pub async fn collect_stream<S>(chunks: S) -> Result<ModelResult, GenError>
where
    S: TryStream<Ok = ChatChunk, Error = GenError>,
{
    chunks
        .try_fold(ModelResult::default(), |mut acc, chunk| async move {
            if let Some(text) = chunk.choices.first().and_then(|c| c.delta.content.as_deref()) {
                acc.text.push_str(text);
            }
            if let Some(usage) = chunk.usage {
                tracing::debug!(?usage, "token usage");
                acc.usage = Some(usage);
            }
            Ok(acc)
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> ChatChunk {
        ChatChunk {
            choices: vec![ChunkChoice { delta: Delta { content: Some(text.into()) } }],
            usage: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn fragments_concatenate_in_order() {
        let mut last = ChatChunk { choices: vec![], usage: None, error: None };
        last.usage = Some(UsageStats { prompt_tokens: Some(10), completion_tokens: Some(3), total_tokens: Some(13) });
        let s = stream::iter(vec![Ok(chunk("{\"a\"")), Ok(chunk(":1")), Ok(chunk("}")), Ok(last)]);
        let res = collect_stream(s).await.unwrap();
        assert_eq!(res.text, "{\"a\":1}");
        assert_eq!(res.usage.unwrap().total_tokens, Some(13));
    }

    #[tokio::test]
    async fn error_mid_stream_propagates() {
        let s = stream::iter(vec![Ok(chunk("par")), Err(GenError::transport(None, "reset by peer"))]);
        assert!(matches!(collect_stream(s).await, Err(GenError::Transport { .. })));
    }

    #[test]
    fn decoder_handles_split_lines_and_done() {
        let mut d = SseDecoder::default();
        let first = d.feed(b": keepalive\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"He");
        assert!(first.is_empty());
        let second = d.feed(b"llo\"}}]}\n\ndata: [DONE]\n\ndata: {\"choices\":[]}\n");
        assert_eq!(second.len(), 1);
        let c = second.into_iter().next().unwrap().unwrap();
        assert_eq!(c.choices[0].delta.content.as_deref(), Some("Hello"));
    }

    #[test]
    fn decoder_flags_malformed_chunk() {
        let mut d = SseDecoder::default();
        let out = d.feed(b"data: {not json}\n");
        assert!(matches!(out.as_slice(), [Err(GenError::Transport { status: None, .. })]));
    }

    #[tokio::test]
    async fn multibyte_text_split_across_reads() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"Café →\"}}]}\n\n".as_bytes();
        let cut = line.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let reads = vec![Ok::<_, GenError>(line[..cut].to_vec()), Ok(line[cut..].to_vec())];
        let res = collect_stream(decode_sse(stream::iter(reads))).await.unwrap();
        assert_eq!(res.text, "Café →");
    }

    #[tokio::test]
    async fn unterminated_last_line_is_flushed() {
        let reads = vec![
            Ok::<_, GenError>(b"data: {\"choices\":[{\"delta\":{\"content\":\"{\\\"a\\\"\"}}]}\n".to_vec()),
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\":1}\"}}]}".to_vec()),
        ];
        let res = collect_stream(decode_sse(stream::iter(reads))).await.unwrap();
        assert_eq!(res.text, "{\"a\":1}");
    }

    #[test]
    fn invalid_utf8_line_is_a_transport_error() {
        let mut d = SseDecoder::default();
        let out = d.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"\xff\"}}]}\n");
        assert!(matches!(out.as_slice(), [Err(GenError::Transport { status: None, .. })]));
    }

    #[tokio::test]
    async fn error_event_mid_stream_keeps_its_status() {
        let reads = vec![Ok::<_, GenError>(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"{\\\"proj\"}}]}\n\ndata: {\"error\":{\"code\":429,\"message\":\"Rate limit exceeded\"}}\n\n"
                .to_vec(),
        )];
        match collect_stream(decode_sse(stream::iter(reads))).await {
            Err(e @ GenError::Transport { .. }) => {
                assert_eq!(e.status(), Some(429));
                assert_eq!(crate::policy::classify_failure(&e), crate::policy::FailureClass::RateLimited);
            }
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[test]
    fn error_code_as_string() {
        let body: ApiErrorBody = serde_json::from_str(r#"{"code":"429","message":"slow down"}"#).unwrap();
        assert_eq!(body.status(), Some(429));
        let body: ApiErrorBody = serde_json::from_str(r#"{"message":"no code"}"#).unwrap();
        assert_eq!(body.status(), None);
    }
}
