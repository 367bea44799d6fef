//! Writing collected artifacts to the output directory.
//!
//! - Unchanged files (same blake3 hash) are not touched.
//! - Changed files go through a temp file plus rename, so a reader never
//!   sees a half-written page.
//! - After a full emission, files of the previous output set that were not
//!   produced again are removed. Without a previous set (first build) the
//!   directory on disk is used instead.
//! - After a partial emission, only files owned by the re-emitted documents
//!   can go stale: a document that became a draft or dropped an alias loses
//!   those files, everything else is carried over.
//!
//! Files owned by documents that failed this pass are always kept, so their
//! last good version stays served.

use super::{Artifact, ArtifactBody, OutputSet};
use crate::core::slug::Slug;
use crate::debug;
use crate::utils::hash::ContentHash;
use anyhow::{Context, Result};
use jwalk::WalkDir;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Which documents an emission covered.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    /// Every emitter ran over every document.
    Full,
    /// Document emitters only ran for these slugs.
    Partial(&'a BTreeSet<Slug>),
}

/// What a write pass did.
#[derive(Debug, Default)]
pub struct WriteSummary {
    /// The output set after this pass.
    pub output: OutputSet,
    pub written: Vec<PathBuf>,
    pub unchanged: usize,
    pub removed: Vec<PathBuf>,
}

/// Write `artifacts` under `output_dir` and drop what went stale.
pub fn write_artifacts(
    output_dir: &Path,
    artifacts: Vec<Artifact>,
    previous: Option<&OutputSet>,
    failed: &BTreeSet<Slug>,
    scope: Scope<'_>,
) -> Result<WriteSummary> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let mut summary = WriteSummary::default();
    let mut produced = OutputSet::new();
    for artifact in artifacts {
        let dest = output_dir.join(&artifact.path);
        if write_one(&dest, &artifact.body)? {
            summary.written.push(artifact.path.clone());
        } else {
            summary.unchanged += 1;
        }
        produced.insert(artifact.path, artifact.owner);
    }

    let stale = match scope {
        Scope::Full => {
            let stale = stale_files(output_dir, &produced, previous, failed);
            summary.output = produced;
            stale
        }
        Scope::Partial(changed) => {
            let mut output = previous.cloned().unwrap_or_default();
            let stale: Vec<_> = output
                .iter()
                .filter(|(path, owner)| {
                    owner.is_some_and(|o| changed.contains(o)) && !produced.contains(path)
                })
                .map(|(path, owner)| (path.to_path_buf(), owner.cloned()))
                .collect();
            for (path, owner) in produced.iter() {
                output.insert(path.to_path_buf(), owner.cloned());
            }
            summary.output = output;
            stale
        }
    };

    for (rel, owner) in stale {
        if owner.as_ref().is_some_and(|slug| failed.contains(slug)) {
            summary.output.insert(rel, owner);
            continue;
        }
        summary.output.remove(&rel);
        let path = output_dir.join(&rel);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("write"; "removed {}", rel.display());
                remove_empty_parents(output_dir, &path);
                summary.removed.push(rel);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("failed to remove {}", path.display()));
            }
        }
    }

    Ok(summary)
}

/// Write `body` to `dest` unless it already has that content.
/// Returns whether the file was written.
fn write_one(dest: &Path, body: &ArtifactBody) -> Result<bool> {
    let existing = ContentHash::of_file(dest)
        .with_context(|| format!("failed to read {}", dest.display()))?;

    let bytes = match body {
        ArtifactBody::Bytes(bytes) => {
            if existing == Some(ContentHash::of(bytes)) {
                return Ok(false);
            }
            bytes.clone()
        }
        ArtifactBody::Copy(source) => {
            let bytes =
                fs::read(source).with_context(|| format!("failed to read {}", source.display()))?;
            if existing == Some(ContentHash::of(&bytes)) {
                return Ok(false);
            }
            bytes
        }
    };

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let tmp = temp_path(dest);
    fs::write(&tmp, &bytes).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, dest).with_context(|| format!("failed to move into {}", dest.display()))?;
    Ok(true)
}

/// `dir/page.html` → `dir/.page.html.tmp`
fn temp_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}.tmp"))
}

/// Files that exist from before but are not in `current`, with their owners.
fn stale_files(
    output_dir: &Path,
    current: &OutputSet,
    previous: Option<&OutputSet>,
    failed: &BTreeSet<Slug>,
) -> Vec<(PathBuf, Option<Slug>)> {
    match previous {
        Some(previous) => previous
            .iter()
            .filter(|(path, _)| !current.contains(path))
            .map(|(path, owner)| (path.to_path_buf(), owner.cloned()))
            .collect(),
        None => {
            // nothing recorded yet: ownership is inferred from the page path
            let mut on_disk: Vec<_> = WalkDir::new(output_dir)
                .sort(true)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .filter_map(|e| e.path().strip_prefix(output_dir).ok().map(Path::to_path_buf))
                .filter(|rel| !current.contains(rel))
                .map(|rel| {
                    let owner = failed
                        .iter()
                        .find(|slug| Path::new(&slug.html_path()) == rel)
                        .cloned();
                    (rel, owner)
                })
                .collect();
            on_disk.sort();
            on_disk
        }
    }
}

/// Remove now-empty directories between `path` and `root`.
fn remove_empty_parents(root: &Path, path: &Path) {
    let mut dir = path.parent();
    while let Some(d) = dir {
        if d == root || !d.starts_with(root) || fs::remove_dir(d).is_err() {
            break;
        }
        dir = d.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn page(path: &str, owner: Option<&str>, body: &str) -> Artifact {
        Artifact::bytes(path, owner.map(Slug::new), body)
    }

    fn read(dir: &Path, rel: &str) -> String {
        fs::read_to_string(dir.join(rel)).unwrap()
    }

    #[test]
    fn test_skips_unchanged() {
        let dir = TempDir::new().unwrap();
        let none = BTreeSet::new();

        let first = write_artifacts(dir.path(), vec![page("a.html", Some("a"), "A")], None, &none, Scope::Full)
            .unwrap();
        assert_eq!(first.written, vec![PathBuf::from("a.html")]);

        let second = write_artifacts(
            dir.path(),
            vec![page("a.html", Some("a"), "A")],
            Some(&first.output),
            &none,
            Scope::Full,
        )
        .unwrap();
        assert!(second.written.is_empty());
        assert_eq!(second.unchanged, 1);
        assert_eq!(second.output, first.output);
    }

    #[test]
    fn test_removes_stale_from_previous_set() {
        let dir = TempDir::new().unwrap();
        let none = BTreeSet::new();
        let first = write_artifacts(
            dir.path(),
            vec![page("a.html", Some("a"), "A"), page("sub/b.html", Some("sub/b"), "B")],
            None,
            &none,
            Scope::Full,
        )
        .unwrap();

        let second = write_artifacts(
            dir.path(),
            vec![page("a.html", Some("a"), "A")],
            Some(&first.output),
            &none,
            Scope::Full,
        )
        .unwrap();
        assert_eq!(second.removed, vec![PathBuf::from("sub/b.html")]);
        assert!(!dir.path().join("sub").exists());
    }

    #[test]
    fn test_first_build_cleans_disk_but_keeps_failed_pages() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("leftover.html"), "old").unwrap();
        fs::write(dir.path().join("broken.html"), "last good").unwrap();

        let failed: BTreeSet<Slug> = [Slug::new("broken")].into();
        let summary = write_artifacts(
            dir.path(),
            vec![page("a.html", Some("a"), "A")],
            None,
            &failed,
            Scope::Full,
        )
        .unwrap();

        assert!(!dir.path().join("leftover.html").exists());
        assert_eq!(read(dir.path(), "broken.html"), "last good");
        assert_eq!(summary.output.owner(Path::new("broken.html")), Some(&Slug::new("broken")));
    }

    #[test]
    fn test_partial_keeps_everything_else() {
        let dir = TempDir::new().unwrap();
        let none = BTreeSet::new();
        let first = write_artifacts(
            dir.path(),
            vec![page("a.html", Some("a"), "A"), page("b.html", Some("b"), "B")],
            None,
            &none,
            Scope::Full,
        )
        .unwrap();

        let changed: BTreeSet<Slug> = [Slug::new("a")].into();
        let partial = write_artifacts(
            dir.path(),
            vec![page("a.html", Some("a"), "A2")],
            Some(&first.output),
            &none,
            Scope::Partial(&changed),
        )
        .unwrap();
        assert!(partial.removed.is_empty());
        assert_eq!(partial.output.len(), 2);
        assert_eq!(read(dir.path(), "a.html"), "A2");
        assert_eq!(read(dir.path(), "b.html"), "B");
    }

    #[test]
    fn test_copy_artifact() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.png");
        fs::write(&src, [1u8, 2, 3]).unwrap();
        let out = dir.path().join("out");

        let summary = write_artifacts(
            &out,
            vec![Artifact::copy("img/x.png", &src)],
            None,
            &BTreeSet::new(),
            Scope::Full,
        )
        .unwrap();
        assert_eq!(summary.written.len(), 1);
        assert_eq!(fs::read(out.join("img/x.png")).unwrap(), vec![1, 2, 3]);
        assert!(!out.join("img/.x.png.tmp").exists());
    }

    #[test]
    fn test_partial_drops_files_the_changed_document_no_longer_emits() {
        let dir = TempDir::new().unwrap();
        let none = BTreeSet::new();
        let first = write_artifacts(
            dir.path(),
            vec![
                page("a.html", Some("a"), "A"),
                page("old-a.html", Some("a"), "redirect"),
                page("b.html", Some("b"), "B"),
                page("sitemap.xml", None, "<urlset/>"),
            ],
            None,
            &none,
            Scope::Full,
        )
        .unwrap();

        // `a` became a draft: nothing is emitted for it any more
        let changed: BTreeSet<Slug> = [Slug::new("a")].into();
        let partial = write_artifacts(
            dir.path(),
            vec![page("sitemap.xml", None, "<urlset/>")],
            Some(&first.output),
            &none,
            Scope::Partial(&changed),
        )
        .unwrap();

        assert_eq!(partial.removed, vec![PathBuf::from("a.html"), PathBuf::from("old-a.html")]);
        assert!(!dir.path().join("a.html").exists());
        assert!(!partial.output.contains(Path::new("old-a.html")));
        assert_eq!(read(dir.path(), "b.html"), "B");
        assert!(partial.output.contains(Path::new("b.html")));
        assert!(partial.output.contains(Path::new("sitemap.xml")));
    }

    #[test]
    fn test_partial_keeps_pages_of_failed_documents() {
        let dir = TempDir::new().unwrap();
        let none = BTreeSet::new();
        let first =
            write_artifacts(dir.path(), vec![page("a.html", Some("a"), "A")], None, &none, Scope::Full)
                .unwrap();

        let changed: BTreeSet<Slug> = [Slug::new("a")].into();
        let partial = write_artifacts(
            dir.path(),
            Vec::new(),
            Some(&first.output),
            &changed,
            Scope::Partial(&changed),
        )
        .unwrap();

        assert!(partial.removed.is_empty());
        assert_eq!(read(dir.path(), "a.html"), "A");
        assert!(partial.output.contains(Path::new("a.html")));
    }
}
