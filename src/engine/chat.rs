// Chatstream Engine — Streaming Chat Client
//
// Drives one HTTP request per chat turn: POST the prompt, then pull the
// chunked SSE response through a fresh `FrameReassembler`, delivering each
// payload to the caller's sink in order.
//
// The read loop is a plain sequential `next().await` (no recursive
// continuation callbacks), and it is transport-independent: `pump_stream`
// accepts any fallible byte-chunk stream, so tests inject canned chunk
// sequences without a live connection.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use log::{error, info, warn};
use std::sync::LazyLock;
use std::time::Duration;
use uuid::Uuid;

use crate::atoms::constants::{
    CONTROL_TIMEOUT_SECS, ROUTE_HEALTH, ROUTE_MODELS, ROUTE_STREAM_CHAT,
};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{truncate_utf8, ChatRequest, HealthResponse, ModelsResponse, StreamOutcome};
use crate::engine::config::ChatConfig;
use crate::engine::http::{
    is_retryable_status, parse_retry_after, retry_delay, shared_client, CircuitBreaker, MAX_RETRIES,
};
use crate::engine::sse::FrameReassembler;

/// Circuit breaker shared across all chat requests in this process.
/// Fail-fast only — the streaming route is never retried.
static CHAT_CIRCUIT: LazyLock<CircuitBreaker> = LazyLock::new(|| CircuitBreaker::new(5, 60));

// ── Sink boundary ──────────────────────────────────────────────────────────

/// Receiver of streamed payloads. The caller owns the accumulated response;
/// payloads arrive in discovery order, each exactly once, never partial.
///
/// Transport failures are NOT delivered here — they surface as the `Err`
/// of the driving call, a distinct signal from payload delivery.
#[async_trait]
pub trait ChatSink: Send {
    async fn on_payload(&mut self, text: &str);
}

// Collecting sink, mainly for tests and batch callers.
#[async_trait]
impl ChatSink for Vec<String> {
    async fn on_payload(&mut self, text: &str) {
        self.push(text.to_string());
    }
}

// ── Transport read loop ────────────────────────────────────────────────────

/// Pull byte chunks out of `stream`, reassemble SSE frames, and deliver
/// payloads to `sink` until the sentinel is seen or the stream ends.
///
/// A failed chunk read aborts the loop with `EngineError::Transport`;
/// payloads already delivered stand. An incomplete trailing frame at
/// natural stream end is discarded, never emitted.
pub async fn pump_stream<S, B, E>(
    mut stream: S,
    sink: &mut (impl ChatSink + ?Sized),
) -> EngineResult<StreamOutcome>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut reassembler = FrameReassembler::new();
    let mut delivered = 0usize;

    while let Some(next) = stream.next().await {
        let chunk = next.map_err(|e| EngineError::transport(format!("Stream read error: {}", e)))?;
        for payload in reassembler.feed(chunk.as_ref()) {
            delivered += 1;
            sink.on_payload(&payload).await;
        }
        if reassembler.is_done() {
            // Sentinel observed: stop reading, even if the transport has more.
            break;
        }
    }

    Ok(StreamOutcome {
        done: reassembler.is_done(),
        payloads: delivered,
    })
}

// ── Client ─────────────────────────────────────────────────────────────────

pub struct ChatClient {
    client: reqwest::Client,
    config: ChatConfig,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            client: shared_client(),
            config,
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Stream one chat completion into `sink`.
    ///
    /// Single attempt by contract: connection failures and non-2xx
    /// responses return an error for the caller to present — no retry,
    /// no replay. Cancellation is dropping the returned future; that
    /// stops the read loop and releases the connection.
    pub async fn stream_chat(
        &self,
        prompt: &str,
        model: &str,
        sink: &mut (impl ChatSink + ?Sized),
    ) -> EngineResult<StreamOutcome> {
        CHAT_CIRCUIT.check().map_err(EngineError::Transport)?;

        let url = format!("{}{}", self.config.endpoint, ROUTE_STREAM_CHAT);
        let request_id = Uuid::new_v4();
        info!(
            "[engine] stream_chat id={} model={} prompt_chars={}",
            request_id,
            model,
            prompt.chars().count()
        );

        let body = ChatRequest {
            prompt: prompt.to_string(),
            model: model.to_string(),
        };

        let response = match self.client.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                CHAT_CIRCUIT.record_failure();
                error!("[engine] stream_chat id={} connect failed: {}", request_id, e);
                return Err(EngineError::Network(e));
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body_text = response.text().await.unwrap_or_default();
            CHAT_CIRCUIT.record_failure();
            error!(
                "[engine] stream_chat id={} API error {}: {}",
                request_id,
                status,
                truncate_utf8(&body_text, 500)
            );
            return Err(EngineError::api(status, truncate_utf8(&body_text, 200)));
        }

        let outcome = pump_stream(response.bytes_stream(), sink).await;
        match &outcome {
            Ok(o) => {
                CHAT_CIRCUIT.record_success();
                info!(
                    "[engine] stream_chat id={} complete: payloads={} done={}",
                    request_id, o.payloads, o.done
                );
            }
            Err(e) => {
                CHAT_CIRCUIT.record_failure();
                error!("[engine] stream_chat id={} aborted: {}", request_id, e);
            }
        }
        outcome
    }

    /// Fetch the service's model list (GET /models), with the standard
    /// retry discipline for transient failures.
    pub async fn list_models(&self) -> EngineResult<Vec<String>> {
        let url = format!("{}{}", self.config.endpoint, ROUTE_MODELS);
        let mut last_error = EngineError::Other("model listing not attempted".into());
        let mut retry_after: Option<u64> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = retry_delay(attempt - 1, retry_after.take()).await;
                warn!(
                    "[engine] list_models retry {}/{} after {}ms",
                    attempt,
                    MAX_RETRIES,
                    delay.as_millis()
                );
            }

            let response = match self
                .client
                .get(&url)
                .timeout(Duration::from_secs(CONTROL_TIMEOUT_SECS))
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_error = EngineError::Network(e);
                    continue;
                }
            };

            if !response.status().is_success() {
                let status = response.status().as_u16();
                retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_retry_after);
                let body_text = response.text().await.unwrap_or_default();
                last_error = EngineError::api(status, truncate_utf8(&body_text, 200));
                if is_retryable_status(status) && attempt < MAX_RETRIES {
                    continue;
                }
                return Err(last_error);
            }

            let parsed: ModelsResponse = response.json().await?;
            info!("[engine] list_models: {} model(s)", parsed.models.len());
            return Ok(parsed.models);
        }

        Err(last_error)
    }

    /// Probe the service health endpoint (GET /health), single attempt.
    /// An unhealthy service answers 503 with a diagnostic body — that is a
    /// valid probe result, not an error.
    pub async fn health(&self) -> EngineResult<HealthResponse> {
        let url = format!("{}{}", self.config.endpoint, ROUTE_HEALTH);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(CONTROL_TIMEOUT_SECS))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body_text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<HealthResponse>(&body_text) {
            Ok(h) => Ok(h),
            Err(_) => Err(EngineError::api(status, truncate_utf8(&body_text, 200))),
        }
    }

    /// Validate `model` against the service's model list before sending.
    ///
    /// If the service reports no models at all (listing unavailable), we
    /// warn and let the request through — the server re-validates anyway.
    pub async fn ensure_model(&self, model: &str) -> EngineResult<()> {
        let models = self.list_models().await?;
        if models.is_empty() {
            warn!("[engine] service reported no models — skipping client-side validation");
            return Ok(());
        }
        if models.iter().any(|m| m == model) {
            return Ok(());
        }
        Err(EngineError::Config(format!(
            "Model '{}' not found. Available: {}",
            model,
            models.join(", ")
        )))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: &[&str]) -> Vec<Result<Vec<u8>, String>> {
        parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect()
    }

    #[tokio::test]
    async fn pump_delivers_payloads_in_order() {
        let mut sink: Vec<String> = Vec::new();
        let s = stream::iter(chunks(&["data: Hel", "lo\n\nda", "ta: [DONE]\n\n"]));
        let outcome = pump_stream(s, &mut sink).await.unwrap();
        assert_eq!(sink, vec!["Hello"]);
        assert!(outcome.done);
        assert_eq!(outcome.payloads, 1);
    }

    #[tokio::test]
    async fn pump_stops_reading_after_sentinel() {
        let mut sink: Vec<String> = Vec::new();
        let s = stream::iter(chunks(&["data: a\n\ndata: [DONE]\n\n", "data: late\n\n"]));
        let outcome = pump_stream(s, &mut sink).await.unwrap();
        assert_eq!(sink, vec!["a"]);
        assert!(outcome.done);
    }

    #[tokio::test]
    async fn pump_reports_natural_end_without_sentinel() {
        let mut sink: Vec<String> = Vec::new();
        let s = stream::iter(chunks(&["data: X\n\n"]));
        let outcome = pump_stream(s, &mut sink).await.unwrap();
        assert_eq!(sink, vec!["X"]);
        assert!(!outcome.done);
        assert_eq!(outcome.payloads, 1);
    }

    #[tokio::test]
    async fn pump_surfaces_mid_stream_failure_after_earlier_payloads() {
        let mut sink: Vec<String> = Vec::new();
        let items: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"data: first\n\n".to_vec()),
            Err("connection reset".to_string()),
        ];
        let err = pump_stream(stream::iter(items), &mut sink).await.unwrap_err();
        assert_eq!(sink, vec!["first"]);
        assert!(matches!(err, EngineError::Transport(_)));
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn pump_discards_trailing_fragment() {
        let mut sink: Vec<String> = Vec::new();
        let s = stream::iter(chunks(&["data: whole\n\ndata: dang", "ling"]));
        let outcome = pump_stream(s, &mut sink).await.unwrap();
        assert_eq!(sink, vec!["whole"]);
        assert!(!outcome.done);
    }
}
