// ── Chatstream Atoms: Pure Data Types ──────────────────────────────────────
// All plain struct definitions with no logic beyond tiny helpers.
// Atoms layer rule: no I/O, no side effects, no imports from engine/.

use serde::{Deserialize, Serialize};

// ── Request boundary ───────────────────────────────────────────────────────

/// Outbound body for the streaming chat route: a free-text prompt plus a
/// model identifier. The service validates the model against its own
/// allow-list; we pre-validate client-side when a model list is available.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub prompt: String,
    pub model: String,
}

// ── Control-route responses ────────────────────────────────────────────────

/// GET /models → `{"models": ["tinyllama:latest", ...]}`
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub models: Vec<String>,
}

/// GET /health → `{"status": "healthy", "ollama": "accessible", "version": "..."}`
/// All fields optional: an unhealthy service answers with a different shape
/// (`{"status": "unhealthy", "error": "..."}`).
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ollama: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// ── Stream completion ──────────────────────────────────────────────────────

/// How a streaming chat call ended.
///
/// `done` reflects the `[DONE]` sentinel specifically; a stream that ends
/// naturally without the sentinel is still a normal completion, with
/// `done == false`. The two signals are orthogonal by contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOutcome {
    /// True iff the sentinel frame was observed.
    pub done: bool,
    /// Number of payloads delivered to the sink.
    pub payloads: usize,
}

// ── Small helpers ──────────────────────────────────────────────────────────

/// Truncate a string to at most `max_bytes`, respecting char boundaries.
/// Used to keep error-body excerpts log-safe.
pub fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_utf8("hello", 10), "hello");
        assert_eq!(truncate_utf8("hello", 3), "hel");
        // 'é' is 2 bytes — cutting inside it must back off
        assert_eq!(truncate_utf8("éé", 3), "é");
        assert_eq!(truncate_utf8("日本語", 4), "日");
    }

    #[test]
    fn chat_request_serializes_to_service_shape() {
        let req = ChatRequest {
            prompt: "hi".into(),
            model: "tinyllama:latest".into(),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["prompt"], "hi");
        assert_eq!(v["model"], "tinyllama:latest");
    }

    #[test]
    fn models_response_tolerates_missing_field() {
        let r: ModelsResponse = serde_json::from_str("{}").unwrap();
        assert!(r.models.is_empty());
    }
}
