//! Core types shared across the codebase.

pub mod slug;
mod state;

pub use state::{is_shutdown, register_server, setup_shutdown_handler};
