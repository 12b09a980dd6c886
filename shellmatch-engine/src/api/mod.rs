//! HTTP API handlers for shellmatch-engine
//!
//! REST endpoints for batch matching and job control, plus an SSE stream of
//! batch progress events.

pub mod health;
pub mod matching;
pub mod sse;

pub use health::health_routes;
pub use matching::matching_routes;
pub use sse::match_event_stream;
