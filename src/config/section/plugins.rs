//! `[plugins.*]` sections: options for the default transformers and emitters.
//!
//! ```toml
//! [plugins.description]
//! length = 150
//! max_length = 300
//!
//! [plugins.toc]
//! max_depth = 3
//! min_entries = 1
//!
//! [plugins.dates]
//! priority = ["frontmatter", "filesystem"]
//!
//! [plugins.index]
//! sitemap = true
//! rss = true
//! rss_limit = 10
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    pub description: DescriptionConfig,
    pub toc: TocConfig,
    pub dates: DatesConfig,
    pub index: IndexConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptionConfig {
    /// Target length; whole sentences are added until it is reached.
    pub length: usize,
    /// Hard cap, truncated with `...`.
    pub max_length: usize,
    /// Show external links as `domain/path` in the plain-text projection.
    pub replace_external_links: bool,
}

impl Default for DescriptionConfig {
    fn default() -> Self {
        Self {
            length: 150,
            max_length: 300,
            replace_external_links: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TocConfig {
    pub max_depth: u8,
    pub min_entries: usize,
    pub show_by_default: bool,
}

impl Default for TocConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            min_entries: 1,
            show_by_default: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateSource {
    Frontmatter,
    Filesystem,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatesConfig {
    /// Sources consulted in order; the first one that yields a date wins.
    pub priority: Vec<DateSource>,
}

impl Default for DatesConfig {
    fn default() -> Self {
        Self {
            priority: vec![DateSource::Frontmatter, DateSource::Filesystem],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub sitemap: bool,
    pub rss: bool,
    pub rss_limit: usize,
    /// Put rendered HTML instead of the description into feed items.
    pub rss_full_html: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            sitemap: true,
            rss: true,
            rss_limit: 10,
            rss_full_html: false,
        }
    }
}
