//! Mock provider servers
//!
//! Stand-ins for the remote services the gateway talks to during a call:
//! - Realtime model WebSocket (session.update, audio, tool calls, hang-ups)
//!
//! The telephony REST API is mocked per test with `wiremock`.

// Not every test binary uses every helper
#![allow(dead_code)]

pub mod realtime_mock;

pub use realtime_mock::{ConnectionEnd, RealtimeMockServer, RecordedHandshake};
