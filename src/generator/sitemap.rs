//! Sitemap rendering.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url><loc>https://example.com/</loc><lastmod>2025-01-01</lastmod></url>
//! </urlset>
//! ```

use crate::utils::date::DateTimeUtc;
use crate::utils::html::escape;
use std::fmt::Write;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Accumulates `<url>` entries in insertion order.
pub struct SitemapWriter {
    xml: String,
}

impl SitemapWriter {
    pub fn new() -> Self {
        let mut xml = String::with_capacity(4096);
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(xml, "<urlset xmlns=\"{SITEMAP_NS}\">");
        Self { xml }
    }

    pub fn push(&mut self, loc: &str, lastmod: Option<DateTimeUtc>) {
        let _ = write!(self.xml, "  <url><loc>{}</loc>", escape(loc));
        if let Some(date) = lastmod {
            let _ = write!(self.xml, "<lastmod>{}</lastmod>", date.to_date_string());
        }
        self.xml.push_str("</url>\n");
    }

    pub fn finish(mut self) -> String {
        self.xml.push_str("</urlset>\n");
        self.xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sitemap_entries() {
        let mut sitemap = SitemapWriter::new();
        sitemap.push("https://example.com/", Some(DateTimeUtc::from_ymd(2025, 1, 1)));
        sitemap.push("https://example.com/a?b&c", None);

        let xml = sitemap.finish();
        assert!(xml.contains(&format!(r#"<urlset xmlns="{SITEMAP_NS}">"#)));
        assert!(xml.contains("<url><loc>https://example.com/</loc><lastmod>2025-01-01</lastmod></url>"));
        assert!(xml.contains("<loc>https://example.com/a?b&amp;c</loc></url>"));
        assert_eq!(xml.matches("<url>").count(), 2);
        assert!(xml.ends_with("</urlset>\n"));
    }

    #[test]
    fn test_empty_sitemap_is_well_formed() {
        let xml = SitemapWriter::new().finish();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<urlset"));
        assert!(!xml.contains("<url>"));
    }
}
