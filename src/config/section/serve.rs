//! `[serve]` section configuration.
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"   # 0.0.0.0 for LAN access
//! port = 8080               # HTTP port
//! ws_port = 3001            # Live reload WebSocket port
//! base_dir = "/garden"      # Serve under a path prefix, like production
//! watch = true              # Rebuild on file changes
//! ws_host = "dev.box:3001"  # Host the browser uses for the reload socket
//! ```

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub interface: IpAddr,
    pub port: u16,
    pub ws_port: u16,
    pub base_dir: String,
    pub watch: bool,

    /// Override for remote development, e.g. when serving from a container.
    pub ws_host: Option<String>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 8080,
            ws_port: 3001,
            base_dir: String::new(),
            watch: true,
            ws_host: None,
        }
    }
}

/// Normalize a base path: leading `/`, no trailing `/`, empty for root.
///
/// `"garden/"` → `"/garden"`, `"/"` → `""`
pub fn normalize_base_dir(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
