//! Reload Module
//!
//! Pushes a `"rebuild"` message to open browser connections after each
//! successful build.
//!
//! ```text
//! Orchestrator --notify--> LiveReloadChannel --"rebuild"--> Browser
//!                                ^
//!        server (accept) --register--+
//! ```
//!
//! # Modules
//!
//! - `channel` - Connection registry and best-effort broadcast
//! - `server` - WebSocket acceptor and liveness reader

pub mod channel;
pub mod server;

pub use channel::LiveReloadChannel;
pub use server::{WsConnection, start_reload_server};
