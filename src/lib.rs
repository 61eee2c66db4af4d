// Chatstream — terminal chat client for an SSE-streaming chat service.
//
// Layering (one-way dependency rule):
//   atoms/   — pure constants, error types, wire structs; no I/O
//   engine/  — config, HTTP resilience, SSE reassembly, streaming client
//   main.rs  — thin CLI front-end over the engine

pub mod atoms;
pub mod engine;
