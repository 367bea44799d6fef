//! HTTP response handlers.

use crate::utils::mime;
use anyhow::{Context, Result, anyhow};
use std::{
    fs,
    path::{Component, Path, PathBuf},
};
use tiny_http::{Header, Method, Request, Response, StatusCode};

/// Locate the file the static responder would serve for `path`.
///
/// Tries the exact file, then `{path}.html`, then `{path}/index.html`.
/// Paths that climb out of `root` never resolve.
pub fn resolve_delegate(root: &Path, path: &str) -> Option<PathBuf> {
    let rel = Path::new(path.trim_matches('/'));
    if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }

    let exact = root.join(rel);
    if rel.as_os_str().is_empty() {
        let index = root.join("index.html");
        return index.is_file().then_some(index);
    }
    if exact.is_file() {
        return Some(exact);
    }

    let name = rel.file_name()?.to_string_lossy();
    let html = exact.with_file_name(format!("{name}.html"));
    if html.is_file() {
        return Some(html);
    }

    let index = exact.join("index.html");
    index.is_file().then_some(index)
}

/// Respond with a file from the output tree.
pub fn respond_file(request: Request, path: &Path) -> Result<()> {
    let content_type = mime::from_path(path);

    if is_head_request(&request) {
        return send_head(request, 200, content_type);
    }

    // Check for Range header (video/audio seeking)
    if let Some(range) = get_range_header(&request) {
        return respond_range(request, path, content_type, &range);
    }

    let body = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    send_body(request, 200, content_type, body)
}

/// Handle Range request for media files (video/audio seeking).
fn respond_range(
    request: Request,
    path: &Path,
    content_type: &'static str,
    range: &str,
) -> Result<()> {
    use std::io::{Read, Seek, SeekFrom};

    let file_size = fs::metadata(path)?.len();
    if file_size == 0 {
        return send_body(request, 200, content_type, Vec::new());
    }

    let range = range.strip_prefix("bytes=").unwrap_or(range);
    let (start, end) = parse_range(range, file_size);
    let length = end - start + 1;

    let mut file = fs::File::open(path)?;
    file.seek(SeekFrom::Start(start))?;
    let reader = file.take(length);

    let content_range = format!("bytes {start}-{end}/{file_size}");
    let response = Response::new(
        StatusCode(206),
        vec![
            make_header("Content-Type", content_type)?,
            make_header("Content-Range", &content_range)?,
            make_header("Accept-Ranges", "bytes")?,
            make_header("Cache-Control", "no-cache")?,
        ],
        reader,
        usize::try_from(length).ok(),
        None,
    );

    request.respond(response)?;
    Ok(())
}

/// Parse Range header value "start-end" into inclusive byte bounds.
///
/// `file_size` must be non-zero.
fn parse_range(range: &str, file_size: u64) -> (u64, u64) {
    let last = file_size - 1;
    let (start, end) = match range.trim().split_once('-') {
        // "-500" - last 500 bytes
        Some(("", suffix)) => {
            let suffix: u64 = suffix.trim().parse().unwrap_or(0);
            (file_size.saturating_sub(suffix), last)
        }
        // "0-" or "0-499"
        Some((s, e)) => {
            let start: u64 = s.trim().parse().unwrap_or(0);
            let end: u64 = e.trim().parse().unwrap_or(last);
            (start, end.min(last))
        }
        None => (0, last),
    };

    if start > end { (0, last) } else { (start, end) }
}

/// Extract Range header from request.
fn get_range_header(request: &Request) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case("range"))
        .map(|h| h.value.to_string())
}

/// 302 to `location`.
pub fn respond_redirect(request: Request, location: &str) -> Result<()> {
    let location = percent_encoding::utf8_percent_encode(location, PATH_ESCAPE).to_string();
    let response = Response::empty(StatusCode(302))
        .with_header(make_header("Location", &location)?)
        .with_header(make_header("Cache-Control", "no-cache")?);
    request.respond(response)?;
    Ok(())
}

/// Characters escaped when a decoded path goes back into a `Location`.
const PATH_ESCAPE: &percent_encoding::AsciiSet = &percent_encoding::CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'%');

/// Respond with 404 page (the site's `404.html` or plain text).
pub fn respond_not_found(request: Request, output_dir: &Path) -> Result<()> {
    use mime::types::{HTML, PLAIN};

    let custom_404 = output_dir.join("404.html");
    let has_custom = custom_404.is_file();

    if is_head_request(&request) {
        let mime = if has_custom { HTML } else { PLAIN };
        return send_head(request, 404, mime);
    }

    if has_custom && let Ok(body) = fs::read(&custom_404) {
        return send_body(request, 404, HTML, body);
    }

    send_body(request, 404, PLAIN, b"404 Not Found".to_vec())
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, mime::types::PLAIN, b"503 Service Unavailable".to_vec())
}

/// Respond with 405 for anything but GET and HEAD.
pub fn respond_method_not_allowed(request: Request) -> Result<()> {
    send_body(request, 405, mime::types::PLAIN, b"405 Method Not Allowed".to_vec())
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &'static str) -> Result<()> {
    let response = Response::empty(StatusCode(status))
        .with_header(make_header("Content-Type", content_type)?)
        .with_header(make_header("Cache-Control", "no-cache")?);
    request.respond(response)?;
    Ok(())
}

fn send_body(
    request: Request,
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type)?)
        .with_header(make_header("Cache-Control", "no-cache")?);
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &'static str, value: &str) -> Result<Header> {
    Header::from_bytes(key, value).map_err(|()| anyhow!("invalid `{key}` header value"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn output() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(root.join("index.html"), "home").unwrap();
        fs::write(root.join("about.html"), "about").unwrap();
        fs::write(root.join("docs/index.html"), "docs").unwrap();
        fs::write(root.join("style.css"), "body{}").unwrap();
        dir
    }

    #[test]
    fn test_resolve_delegate_order() {
        let dir = output();
        let root = dir.path();

        assert_eq!(resolve_delegate(root, "/"), Some(root.join("index.html")));
        assert_eq!(resolve_delegate(root, "/style.css"), Some(root.join("style.css")));
        assert_eq!(resolve_delegate(root, "/about"), Some(root.join("about.html")));
        assert_eq!(resolve_delegate(root, "/docs"), Some(root.join("docs/index.html")));
        assert_eq!(resolve_delegate(root, "/docs/"), Some(root.join("docs/index.html")));
        assert_eq!(resolve_delegate(root, "/missing"), None);
    }

    #[test]
    fn test_resolve_delegate_rejects_traversal() {
        let dir = output();
        let root = dir.path().join("docs");
        assert_eq!(resolve_delegate(&root, "/../about.html"), None);
        assert_eq!(resolve_delegate(&root, "/a/../../about"), None);
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("0-499", 1000), (0, 499));
        assert_eq!(parse_range("500-", 1000), (500, 999));
        assert_eq!(parse_range("-100", 1000), (900, 999));
        assert_eq!(parse_range("0-5000", 1000), (0, 999));
        assert_eq!(parse_range("900-100", 1000), (0, 999));
        assert_eq!(parse_range("garbage", 1000), (0, 999));
    }
}
