// Chatstream Engine — streaming chat client runtime
// Replaces the browser fetch/reader callback chain with a pull-based
// async read loop over reqwest byte streams.

pub mod chat;
pub mod config;
pub mod http;
pub mod sse;
