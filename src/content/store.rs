//! The in-memory document collection for one build pass.

use super::document::Document;
use super::ignore::{IgnoreSet, is_markdown, walk_files};
use crate::core::slug::{Slug, SlugTracker};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A file that could not become a document.
#[derive(Debug, Clone)]
pub struct Rejected {
    /// Set when the file had claimed its slug before it was rejected.
    pub slug: Option<Slug>,
    pub source: PathBuf,
    pub reason: String,
}

/// Documents keyed by slug, iterated in slug order.
#[derive(Debug, Default)]
pub struct DocumentStore {
    docs: BTreeMap<Slug, Document>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every Markdown file under `content_dir`.
    ///
    /// Slugs are claimed through `tracker`, which the caller creates fresh
    /// for each pass. Unreadable files and slug collisions are rejected
    /// individually and do not stop discovery.
    pub fn load(
        content_dir: &Path,
        ignore: &IgnoreSet,
        tracker: &mut SlugTracker,
    ) -> (Self, Vec<Rejected>) {
        let mut store = Self::new();
        let mut rejected = Vec::new();

        for (full_path, rel) in walk_files(content_dir, ignore) {
            if !is_markdown(&rel) {
                continue;
            }
            let source = PathBuf::from(&rel);
            let reject = |slug: Option<&Slug>, reason: String| Rejected {
                slug: slug.cloned(),
                source: source.clone(),
                reason,
            };

            let slug = match Slug::from_file_path(&source) {
                Ok(slug) => slug,
                Err(e) => {
                    rejected.push(reject(None, e.to_string()));
                    continue;
                }
            };
            // the slug belongs to whoever claimed it first
            if let Err(e) = tracker.claim(&slug, &rel) {
                rejected.push(reject(None, e.to_string()));
                continue;
            }
            match fs::read_to_string(&full_path) {
                Ok(raw) => store.insert(Document::new(slug, source.clone(), full_path, raw)),
                Err(e) => rejected.push(reject(Some(&slug), format!("failed to read: {e}"))),
            }
        }

        (store, rejected)
    }

    pub fn insert(&mut self, doc: Document) {
        self.docs.insert(doc.slug.clone(), doc);
    }

    #[cfg(test)]
    pub fn get(&self, slug: &Slug) -> Option<&Document> {
        self.docs.get(slug)
    }

    pub fn contains(&self, slug: &Slug) -> bool {
        self.docs.contains_key(slug)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn slugs(&self) -> impl Iterator<Item = &Slug> {
        self.docs.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.docs.values()
    }

    /// Mutable access to the underlying map, for parallel stage passes.
    pub(crate) fn docs_mut(&mut self) -> &mut BTreeMap<Slug, Document> {
        &mut self.docs
    }
}

impl FromIterator<Document> for DocumentStore {
    fn from_iter<I: IntoIterator<Item = Document>>(iter: I) -> Self {
        let mut store = Self::new();
        for doc in iter {
            store.insert(doc);
        }
        store
    }
}
