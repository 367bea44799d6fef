//! Document identity and URL slug helpers.
//!
//! A [`Slug`] is the normalized, URL-safe path of a document relative to the
//! content root, without the `.md` extension:
//!
//! ```text
//! content/Notes/My Page.md   → Notes/My-Page
//! content/docs/_index.md     → docs/index
//! content/img/cat photo.png  → img/cat-photo.png
//! ```
//!
//! Slugs are stable across rebuilds as long as the source path is unchanged.

use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Errors raised while assigning slugs to discovered files.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlugError {
    #[error("path `{0}` produces an empty slug")]
    Empty(String),

    #[error("slug `{slug}` is already taken by `{existing}`")]
    Collision { slug: Slug, existing: String },
}

/// Normalized document identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Wrap an already-normalized slug string.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Derive the slug for a file path relative to the content root.
    pub fn from_file_path(rel: &Path) -> Result<Self, SlugError> {
        let raw = rel.to_string_lossy().replace('\\', "/");
        let slug = slugify_file_path(&raw);
        if slug.is_empty() {
            return Err(SlugError::Empty(raw));
        }
        Ok(Self(slug))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form used in links: `a/index` → `a/`, `index` → `/`.
    pub fn simplify(&self) -> String {
        simplify_slug(&self.0)
    }

    /// Relative path from this slug's page back to the site root.
    ///
    /// `index` → `.`, `a/b` → `..`, `a/b/c` → `../..`
    pub fn path_to_root(&self) -> String {
        let depth = self.0.split('/').filter(|s| !s.is_empty()).count();
        if depth <= 1 {
            return ".".to_string();
        }
        vec![".."; depth - 1].join("/")
    }

    /// Relative URL from this page to `target`.
    pub fn relative_to(&self, target: &Slug) -> String {
        let root = self.path_to_root();
        let target = target.simplify();
        if target == "/" {
            format!("{root}/")
        } else {
            format!("{root}/{target}")
        }
    }

    /// Output file path for the page rendered from this slug.
    pub fn html_path(&self) -> String {
        format!("{}.html", self.0)
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Path slugification
// ============================================================================

/// Slugify a single path segment.
fn slugify_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        match c {
            c if c.is_whitespace() => out.push('-'),
            '&' => out.push_str("-and-"),
            '%' => out.push_str("-percent"),
            '?' | '#' => {}
            c => out.push(c),
        }
    }
    out
}

/// Slugify every segment of a `/`-separated path and drop a trailing slash.
fn slugify_path(path: &str) -> String {
    let joined = path
        .split('/')
        .map(slugify_segment)
        .collect::<Vec<_>>()
        .join("/");
    joined.trim_end_matches('/').to_string()
}

/// Extension including the dot, if the last segment has an alphanumeric one.
///
/// A bare `.md` is all extension: its stem is empty.
pub fn file_extension(path: &str) -> Option<&str> {
    let last = path.rsplit('/').next().unwrap_or(path);
    let dot = last.rfind('.')?;
    let ext = &last[dot + 1..];
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(&last[dot..])
}

/// Convert a content-relative file path into a slug string.
///
/// `.md` and `.html` extensions are dropped; other extensions are kept so
/// assets stay addressable. A trailing `_index` segment becomes `index`.
pub fn slugify_file_path(path: &str) -> String {
    let path = path.trim_matches('/');
    let ext = file_extension(path);
    let stem = match ext {
        Some(ext) => &path[..path.len() - ext.len()],
        None => path,
    };
    let keep_ext = match ext {
        Some(".md") | Some(".html") | None => "",
        Some(ext) => ext,
    };

    let mut slug = slugify_path(stem);
    if ends_with_segment(&slug, "_index") {
        slug.truncate(slug.len() - "_index".len());
        slug.push_str("index");
    }
    slug.push_str(keep_ext);
    slug
}

/// Slugify a tag, keeping `/` as a hierarchy separator.
pub fn slugify_tag(tag: &str) -> String {
    tag.split('/')
        .map(|seg| slugify_segment(seg.trim()))
        .collect::<Vec<_>>()
        .join("/")
}

fn ends_with_segment(s: &str, suffix: &str) -> bool {
    s == suffix || s.ends_with(&format!("/{suffix}"))
}

/// `a/index` → `a/`, `index` → `/`, anything else unchanged.
pub fn simplify_slug(slug: &str) -> String {
    let trimmed = if ends_with_segment(slug, "index") {
        &slug[..slug.len() - "index".len()]
    } else {
        slug
    };
    let trimmed = trimmed.trim_start_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

// ============================================================================
// Collision tracking
// ============================================================================

/// Tracks which source path claimed each slug during one build pass.
///
/// Created fresh for every pass; never shared across builds.
#[derive(Debug, Default)]
pub struct SlugTracker {
    claimed: FxHashMap<Slug, String>,
}

impl SlugTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `slug` for `source`. The first claimant wins.
    pub fn claim(&mut self, slug: &Slug, source: &str) -> Result<(), SlugError> {
        if let Some(existing) = self.claimed.get(slug) {
            return Err(SlugError::Collision {
                slug: slug.clone(),
                existing: existing.clone(),
            });
        }
        self.claimed.insert(slug.clone(), source.to_string());
        Ok(())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.claimed.len()
    }
}

// ============================================================================
// Heading ids
// ============================================================================

/// GitHub-style heading id generator with per-document duplicate tracking.
#[derive(Debug, Default)]
pub struct HeadingSlugger {
    occurrences: FxHashMap<String, usize>,
}

impl HeadingSlugger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce a unique id for `text`: `Intro`, `Intro` → `intro`, `intro-1`.
    pub fn slug(&mut self, text: &str) -> String {
        let original = heading_id(text);
        let mut result = original.clone();
        while self.occurrences.contains_key(&result) {
            let count = self.occurrences.entry(original.clone()).or_insert(0);
            *count += 1;
            result = format!("{original}-{count}");
        }
        self.occurrences.insert(result.clone(), 0);
        result
    }
}

fn heading_id(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            '-' | '_' => Some(c),
            c if c.is_alphanumeric() => Some(c),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
