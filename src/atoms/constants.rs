// ── Chatstream Atoms: Constants ────────────────────────────────────────────
// All named constants for the crate live here.
// Rationale: collecting constants in one place eliminates magic strings and
// keeps the wire framing auditable against the service contract.

// ── SSE wire framing ───────────────────────────────────────────────────────
// The framing is bit-exact: frames are separated by two line feeds, a
// recognized frame starts with the literal `data: ` tag (word, colon, one
// space), and the reserved payload `[DONE]` ends the stream. Changing any
// of these breaks interop with the service — treat as stable identifiers.

/// Tag prefix of a recognized SSE frame.
pub const DATA_PREFIX: &str = "data: ";

/// Frame delimiter: two consecutive line feeds.
pub const FRAME_DELIMITER: &str = "\n\n";

/// Reserved payload signaling intentional end of stream.
pub const DONE_SENTINEL: &str = "[DONE]";

// ── Service routes ─────────────────────────────────────────────────────────

/// Streaming chat completion route (POST, JSON body).
pub const ROUTE_STREAM_CHAT: &str = "/stream_chat";

/// Model listing route (GET).
pub const ROUTE_MODELS: &str = "/models";

/// Health probe route (GET).
pub const ROUTE_HEALTH: &str = "/health";

// ── Defaults ───────────────────────────────────────────────────────────────

/// Default chat service endpoint when no env/flag override is present.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000";

/// Default model identifier sent with chat requests.
pub const DEFAULT_MODEL: &str = "tinyllama:latest";

/// TCP connect timeout for all outbound requests, in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Whole-request timeout for control calls (models/health), in seconds.
/// The streaming chat call deliberately carries no whole-request timeout —
/// a generation may legitimately run for minutes.
pub const CONTROL_TIMEOUT_SECS: u64 = 10;
