//! HTTP API handlers for lstn-se
//!
//! REST surface plus an SSE stream; this is the whole contract exposed to
//! the web UI.

pub mod album_art;
pub mod cache_admin;
pub mod health;
pub mod manual_match;
pub mod sse;
pub mod stats_run;

pub use album_art::album_art_routes;
pub use cache_admin::cache_routes;
pub use health::health_routes;
pub use manual_match::match_routes;
pub use sse::stats_event_stream;
pub use stats_run::stats_routes;
