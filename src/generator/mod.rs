//! Emission: turning the enriched document store into output files.
//!
//! # Module Structure
//!
//! ```text
//! generator/
//! ├── page           # {slug}.html and 404.html
//! ├── alias          # {alias}.html redirects
//! ├── content_index  # sitemap.xml, index.xml, static/contentIndex.json
//! ├── sitemap, feed  # XML rendering used by content_index
//! ├── cname          # CNAME
//! ├── assets         # content assets and static/ copies
//! └── write          # hashing, atomic writes, stale removal
//! ```
//!
//! Emitters are lazy: [`Emitter::emit`] returns an iterator, and nothing is
//! produced until [`collect`] drives it. Every artifact of a pass is held in
//! memory before [`write::write_artifacts`] touches the output directory, so
//! a failing emitter leaves the previous output untouched.

mod alias;
mod assets;
mod cname;
mod content_index;
mod feed;
mod page;
mod sitemap;
pub mod write;

pub use alias::AliasRedirects;
pub use assets::{Assets, Static};
pub use cname::Cname;
pub use content_index::ContentIndex;
pub use page::{ContentPage, NotFoundPage};

use crate::config::SiteConfig;
use crate::content::{Document, DocumentStore};
use crate::core::slug::Slug;
use crate::pipeline::{PassReport, Resources};
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

// ============================================================================
// Artifacts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactBody {
    Bytes(Vec<u8>),
    /// Copy an existing file verbatim.
    Copy(PathBuf),
}

/// One output file, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    /// Document this file was produced from, if any.
    pub owner: Option<Slug>,
    pub body: ArtifactBody,
}

impl Artifact {
    pub fn bytes(path: impl Into<PathBuf>, owner: Option<Slug>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            owner,
            body: ArtifactBody::Bytes(bytes.into()),
        }
    }

    pub fn copy(path: impl Into<PathBuf>, source: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owner: None,
            body: ArtifactBody::Copy(source.into()),
        }
    }
}

/// Paths written by the last successful emission, with their owners.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSet {
    files: BTreeMap<PathBuf, Option<Slug>>,
}

impl OutputSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: PathBuf, owner: Option<Slug>) {
        self.files.insert(path, owner);
    }

    pub fn remove(&mut self, path: &Path) {
        self.files.remove(path);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    #[cfg(test)]
    pub fn owner(&self, path: &Path) -> Option<&Slug> {
        self.files.get(path).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, Option<&Slug>)> {
        self.files.iter().map(|(p, o)| (p.as_path(), o.as_ref()))
    }
}

// ============================================================================
// Emitter capability
// ============================================================================

pub type Artifacts<'a> = Box<dyn Iterator<Item = Result<Artifact>> + 'a>;

/// Read-only inputs of one emission.
pub struct EmitContext<'a> {
    pub config: &'a SiteConfig,
    pub report: &'a PassReport,
}

impl<'a> EmitContext<'a> {
    pub fn new(config: &'a SiteConfig, report: &'a PassReport) -> Self {
        Self { config, report }
    }

    /// Documents that went through every stage without failing and are
    /// not drafts.
    pub fn published<'s>(
        &self,
        store: &'s DocumentStore,
    ) -> impl Iterator<Item = &'s Document> + use<'s, 'a> {
        let report = self.report;
        store.iter().filter(move |d| {
            !report.is_failed(&d.slug) && !d.frontmatter.get().is_some_and(|fm| fm.draft)
        })
    }
}

pub trait Emitter: Send + Sync {
    fn name(&self) -> &'static str;

    fn emit<'a>(
        &'a self,
        ctx: &'a EmitContext<'a>,
        store: &'a DocumentStore,
        resources: &'a Resources,
    ) -> Artifacts<'a>;

    /// Emission restricted to changed documents. `None` means the emitter
    /// always runs in full.
    fn partial(&self) -> Option<&dyn PartialEmit> {
        None
    }
}

pub trait PartialEmit: Send + Sync {
    fn emit_partial<'a>(
        &'a self,
        ctx: &'a EmitContext<'a>,
        store: &'a DocumentStore,
        resources: &'a Resources,
        changed: &'a BTreeSet<Slug>,
    ) -> Artifacts<'a>;
}

/// The default emitter list.
pub fn default_emitters() -> Vec<Box<dyn Emitter>> {
    vec![
        Box::new(ContentPage),
        Box::new(AliasRedirects),
        Box::new(ContentIndex),
        Box::new(Cname),
        Box::new(Assets),
        Box::new(Static),
        Box::new(NotFoundPage),
    ]
}

/// Drive every emitter to completion.
///
/// With `changed`, emitters that support partial emission only produce the
/// changed documents' files; the others run in full. The first error aborts.
pub fn collect(
    emitters: &[Box<dyn Emitter>],
    ctx: &EmitContext<'_>,
    store: &DocumentStore,
    resources: &Resources,
    changed: Option<&BTreeSet<Slug>>,
) -> Result<Vec<Artifact>> {
    let mut artifacts = Vec::new();
    for emitter in emitters {
        let iter = match (changed, emitter.partial()) {
            (Some(changed), Some(partial)) => partial.emit_partial(ctx, store, resources, changed),
            _ => emitter.emit(ctx, store, resources),
        };
        for artifact in iter {
            artifacts.push(artifact.with_context(|| format!("emitter `{}` failed", emitter.name()))?);
        }
    }
    Ok(artifacts)
}
