//! A single source document and its derived fields.
//!
//! Raw fields are filled at discovery. Every derived field lives in a
//! [`Derived`] cell that one plugin owns: it is written once per pass, and a
//! second write fails unless the caller explicitly asks to [`Derived::replace`].

use crate::core::slug::Slug;
use crate::utils::date::DateTimeUtc;
use pulldown_cmark::Event;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Parsed Markdown, as an owned event stream.
pub type Tree = Vec<Event<'static>>;

/// Names of derived fields, used for ordering checks and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    FrontMatter,
    Tree,
    Rendered,
    PlainText,
    Description,
    ReadingTime,
    Dates,
    Toc,
    Aliases,
    Links,
}

impl Field {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FrontMatter => "frontmatter",
            Self::Tree => "tree",
            Self::Rendered => "rendered",
            Self::PlainText => "plain_text",
            Self::Description => "description",
            Self::ReadingTime => "reading_time",
            Self::Dates => "dates",
            Self::Toc => "toc",
            Self::Aliases => "aliases",
            Self::Links => "links",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("`{field}` was already set by `{owner}`; `{writer}` may not overwrite it")]
    AlreadySet {
        field: Field,
        owner: &'static str,
        writer: &'static str,
    },

    #[error("`{reader}` needs `{field}`, which is not set")]
    Missing { field: Field, reader: &'static str },
}

/// A write-once derived value.
#[derive(Debug, Clone)]
pub struct Derived<T> {
    field: Field,
    value: Option<T>,
    owner: &'static str,
}

impl<T> Derived<T> {
    pub const fn new(field: Field) -> Self {
        Self {
            field,
            value: None,
            owner: "",
        }
    }

    #[inline]
    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Read a field the caller depends on.
    pub fn require(&self, reader: &'static str) -> Result<&T, FieldError> {
        self.value.as_ref().ok_or(FieldError::Missing {
            field: self.field,
            reader,
        })
    }

    /// In-place edit by a later stage of the same kind (tree or rendered output).
    #[inline]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.value.as_mut()
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// First write. Fails if a value is already present.
    pub fn set(&mut self, writer: &'static str, value: T) -> Result<(), FieldError> {
        if self.value.is_some() {
            return Err(FieldError::AlreadySet {
                field: self.field,
                owner: self.owner,
                writer,
            });
        }
        self.value = Some(value);
        self.owner = writer;
        Ok(())
    }

    /// Explicit overwrite; returns the previous value.
    pub fn replace(&mut self, writer: &'static str, value: T) -> Option<T> {
        self.owner = writer;
        self.value.replace(value)
    }
}

// ============================================================================
// Derived value types
// ============================================================================

/// Front matter: well-known keys plus the full open mapping.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FrontMatter {
    pub title: String,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub draft: bool,
    pub noindex: bool,
    pub enable_toc: Option<bool>,
    /// Every declared key, including the ones above.
    pub raw: Map<String, Value>,
}

impl FrontMatter {
    /// First present string value among `keys`.
    pub fn first_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.raw.get(*k).and_then(Value::as_str))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dates {
    pub created: DateTimeUtc,
    pub modified: DateTimeUtc,
    pub published: DateTimeUtc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    /// Depth relative to the shallowest heading, starting at 0.
    pub depth: u8,
    pub text: String,
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadingTime {
    pub words: usize,
    pub minutes: u32,
}

// ============================================================================
// Document
// ============================================================================

/// One source content unit. Rebuilt from scratch on every pass.
#[derive(Debug, Clone)]
pub struct Document {
    pub slug: Slug,
    /// Path relative to the content directory.
    pub source: PathBuf,
    /// Absolute path on disk.
    pub full_path: PathBuf,
    /// File content as read.
    pub raw: String,
    /// Working text for the text stage; parsed into `tree` afterwards.
    pub text: String,

    pub frontmatter: Derived<FrontMatter>,
    pub tree: Derived<Tree>,
    pub rendered: Derived<String>,
    pub plain_text: Derived<String>,
    pub description: Derived<String>,
    pub reading_time: Derived<ReadingTime>,
    pub dates: Derived<Dates>,
    pub toc: Derived<Vec<TocEntry>>,
    pub aliases: Derived<Vec<Slug>>,
    pub links: Derived<Vec<Slug>>,
}

impl Document {
    pub fn new(slug: Slug, source: PathBuf, full_path: PathBuf, raw: String) -> Self {
        Self {
            slug,
            source,
            full_path,
            text: raw.clone(),
            raw,
            frontmatter: Derived::new(Field::FrontMatter),
            tree: Derived::new(Field::Tree),
            rendered: Derived::new(Field::Rendered),
            plain_text: Derived::new(Field::PlainText),
            description: Derived::new(Field::Description),
            reading_time: Derived::new(Field::ReadingTime),
            dates: Derived::new(Field::Dates),
            toc: Derived::new(Field::Toc),
            aliases: Derived::new(Field::Aliases),
            links: Derived::new(Field::Links),
        }
    }

    /// Title from front matter, falling back to the slug's last segment.
    pub fn title(&self) -> &str {
        match self.frontmatter.get() {
            Some(fm) if !fm.title.is_empty() => &fm.title,
            _ => self.slug.as_str().rsplit('/').next().unwrap_or_default(),
        }
    }

    /// Whether `field` has been written.
    pub fn has(&self, field: Field) -> bool {
        match field {
            Field::FrontMatter => self.frontmatter.is_set(),
            Field::Tree => self.tree.is_set(),
            Field::Rendered => self.rendered.is_set(),
            Field::PlainText => self.plain_text.is_set(),
            Field::Description => self.description.is_set(),
            Field::ReadingTime => self.reading_time.is_set(),
            Field::Dates => self.dates.is_set(),
            Field::Toc => self.toc.is_set(),
            Field::Aliases => self.aliases.is_set(),
            Field::Links => self.links.is_set(),
        }
    }
}

#[cfg(test)]
pub fn test_document(slug: &str, raw: &str) -> Document {
    let source = PathBuf::from(format!("{slug}.md"));
    Document::new(Slug::new(slug), source.clone(), source, raw.to_string())
}
