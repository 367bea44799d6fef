//! `[build]` section configuration.
//!
//! ```toml
//! [build]
//! content = "content"      # Markdown sources
//! output = "public"        # Emitted site
//! static_dir = "static"    # Copied verbatim to public/static
//! concurrency = 4          # Worker threads for document passes
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSectionConfig {
    pub content: PathBuf,
    pub output: PathBuf,
    pub static_dir: PathBuf,

    /// Worker threads for per-document stages; `None` uses all cores.
    pub concurrency: Option<usize>,
}

impl Default for BuildSectionConfig {
    fn default() -> Self {
        Self {
            content: "content".into(),
            output: "public".into(),
            static_dir: "static".into(),
            concurrency: None,
        }
    }
}
