//! URL canonicalization for the dev server.
//!
//! Every artifact has exactly one canonical URL: extension-less for pages,
//! trailing slash for directory indices. The non-canonical form redirects
//! once to the canonical one.
//!
//! | request   | `about.html` | `about/index.html` | decision              |
//! |-----------|--------------|--------------------|-----------------------|
//! | `/about/` | yes          | no                 | redirect to `/about`  |
//! | `/about`  | no           | yes                | redirect to `/about/` |
//! | `/about/` | yes          | yes                | serve `about/index`   |
//! | `/about`  | yes          | yes                | serve `about.html`    |
//!
//! The table is intentionally lopsided: with a trailing slash the index
//! wins, without one the extension-less file wins.

use std::path::{Component, Path};

/// Read-only view of the output directory.
pub trait OutputTree {
    /// Whether `rel` (relative to the output root, `/`-separated) is a file.
    fn exists(&self, rel: &str) -> bool;
}

impl OutputTree for Path {
    fn exists(&self, rel: &str) -> bool {
        let rel = Path::new(rel);
        rel.components().all(|c| matches!(c, Component::Normal(_))) && self.join(rel).is_file()
    }
}

/// Routing decision for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Serve `file` (output-relative) at the requested URL.
    Serve { file: String },
    /// 302 to `location`, base prefix included.
    Redirect { location: String },
    /// Hand `path` (base prefix stripped) to the static responder.
    Delegate { path: String },
    /// Outside the configured base prefix.
    NotFound,
}

/// Decide how to answer `path`, a decoded request path without query.
///
/// `base_dir` is normalized: empty, or `/prefix` with no trailing slash.
pub fn route(path: &str, base_dir: &str, tree: &(impl OutputTree + ?Sized)) -> Route {
    let Some(stripped) = strip_base(path, base_dir) else {
        return Route::NotFound;
    };

    // Leading and trailing slash runs collapse: `//about//` routes like
    // `/about/`. Redirects are built from `rel`, never from the raw path, so
    // a location never starts with `//` (a scheme-relative URL).
    let rel = stripped.trim_matches('/');
    if stripped.ends_with('/') {
        let index = index_of(rel);
        if tree.exists(&index) {
            return Route::Serve { file: index };
        }
        if !rel.is_empty() && tree.exists(&with_html(rel)) {
            return Route::Redirect {
                location: format!("{base_dir}/{rel}"),
            };
        }
    } else {
        if !rel.is_empty() {
            let file = with_html(rel);
            if tree.exists(&file) {
                return Route::Serve { file };
            }
        }
        if tree.exists(&index_of(rel)) {
            let location = if rel.is_empty() {
                format!("{base_dir}/")
            } else {
                format!("{base_dir}/{rel}/")
            };
            return Route::Redirect { location };
        }
    }

    Route::Delegate {
        path: stripped.to_string(),
    }
}

/// Strip the base prefix; `None` when `path` lies outside it.
fn strip_base<'a>(path: &'a str, base_dir: &str) -> Option<&'a str> {
    if base_dir.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(base_dir)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

fn index_of(rel: &str) -> String {
    if rel.is_empty() {
        "index.html".to_string()
    } else {
        format!("{rel}/index.html")
    }
}

/// Append `.html` when the last segment has no extension.
fn with_html(rel: &str) -> String {
    let last = rel.rsplit('/').next().unwrap_or(rel);
    if Path::new(last).extension().is_some() {
        rel.to_string()
    } else {
        format!("{rel}.html")
    }
}
