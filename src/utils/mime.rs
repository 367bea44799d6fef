//! Content-Type lookup for the dev server.

use std::path::Path;

pub mod types {
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const OCTET_STREAM: &str = "application/octet-stream";
}

/// Guess the Content-Type from a file name.
///
/// Extensionless files are plain text: the only ones the builder writes
/// are `CNAME` and friends.
pub fn from_path(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return types::PLAIN;
    };

    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => types::HTML,
        "txt" | "md" => types::PLAIN,
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "xml" => "application/xml",
        "rss" => "application/rss+xml",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",

        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",

        "mp3" => "audio/mpeg",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",

        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",

        _ => types::OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(from_path(Path::new("index.html")), types::HTML);
        assert_eq!(from_path(Path::new("index.xml")), "application/xml");
        assert_eq!(from_path(Path::new("static/contentIndex.json")), "application/json");
        assert_eq!(from_path(Path::new("PHOTO.JPG")), "image/jpeg");
        assert_eq!(from_path(Path::new("CNAME")), types::PLAIN);
        assert_eq!(from_path(Path::new("archive.xyz")), types::OCTET_STREAM);
    }
}
