//! `[site]` section configuration.
//!
//! ```toml
//! [site]
//! title = "My Notes"
//! base_url = "notes.example.com/garden"   # scheme optional
//! locale = "en-US"
//! ignore_patterns = ["private", "templates", "*.draft.md"]
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSectionConfig {
    pub title: String,

    /// Production host and optional path, used for CNAME, sitemap and feed links.
    pub base_url: Option<String>,

    pub locale: String,

    /// Glob patterns (relative to the content dir) excluded from discovery.
    pub ignore_patterns: Vec<String>,
}

impl Default for SiteSectionConfig {
    fn default() -> Self {
        Self {
            title: "Quire".to_string(),
            base_url: None,
            locale: "en-US".to_string(),
            ignore_patterns: vec!["private".into(), "templates".into(), ".obsidian".into()],
        }
    }
}

impl SiteSectionConfig {
    /// `base_url` with an `https://` scheme, parsed.
    pub fn parsed_base_url(&self) -> Option<url::Url> {
        let raw = self.base_url.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("https://{raw}")
        };
        url::Url::parse(&with_scheme).ok()
    }

    /// Absolute URL for a site-relative path.
    pub fn absolute_url(&self, rel: &str) -> Option<String> {
        let base = self.parsed_base_url()?;
        let base = base.as_str().trim_end_matches('/');
        Some(format!("{base}/{}", rel.trim_start_matches('/')))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_site_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.site.locale, "en-US");
        assert!(config.site.parsed_base_url().is_none());
        assert!(config.site.ignore_patterns.contains(&"private".to_string()));
    }

    #[test]
    fn test_base_url_without_scheme() {
        let config = test_parse_config("[site]\nbase_url = \"notes.example.com/garden\"");
        let url = config.site.parsed_base_url().unwrap();
        assert_eq!(url.host_str(), Some("notes.example.com"));
        assert_eq!(
            config.site.absolute_url("posts/a"),
            Some("https://notes.example.com/garden/posts/a".to_string())
        );
    }

    #[test]
    fn test_base_url_with_scheme() {
        let config = test_parse_config("[site]\nbase_url = \"http://localhost:8080/\"");
        assert_eq!(
            config.site.absolute_url("/index.xml"),
            Some("http://localhost:8080/index.xml".to_string())
        );
    }
}
