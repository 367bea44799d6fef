//! Content discovery: walking the content tree with ignore patterns.

use anyhow::{Context, Result};
use jwalk::WalkDir;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Files that are never content, regardless of configuration.
const IGNORED_FILES: &[&str] = &[".DS_Store", "Thumbs.db", ".gitkeep"];

/// Compiled `site.ignore_patterns`.
///
/// A pattern matches a path when it matches the whole relative path or any
/// leading run of its segments, so `private` excludes `private/a/b.md`.
#[derive(Debug, Default)]
pub struct IgnoreSet {
    patterns: Vec<Regex>,
}

impl IgnoreSet {
    pub fn new(globs: &[String]) -> Result<Self> {
        let patterns = globs
            .iter()
            .map(|g| {
                Regex::new(&glob_to_regex(g)).with_context(|| format!("invalid ignore pattern `{g}`"))
            })
            .collect::<Result<_>>()?;
        Ok(Self { patterns })
    }

    pub fn is_ignored(&self, rel: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let mut prefix = String::with_capacity(rel.len());
        for (i, segment) in rel.split('/').enumerate() {
            if i > 0 {
                prefix.push('/');
            }
            prefix.push_str(segment);
            if self.patterns.iter().any(|re| re.is_match(&prefix)) {
                return true;
            }
        }
        false
    }
}

/// `**` → any path, `*` → within a segment, `?` → one char.
fn glob_to_regex(glob: &str) -> String {
    let glob = glob.trim().trim_matches('/');
    let mut re = String::from("^");
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                // `**/` also matches zero directories
                if chars.peek() == Some(&'/') {
                    chars.next();
                    re.push_str("(?:.*/)?");
                } else {
                    re.push_str(".*");
                }
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    re
}

/// All non-ignored files under `dir`, as (absolute, `/`-separated relative) pairs,
/// sorted by relative path.
pub fn walk_files(dir: &Path, ignore: &IgnoreSet) -> Vec<(PathBuf, String)> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let mut files: Vec<_> = WalkDir::new(dir)
        .sort(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_str().unwrap_or_default();
            !IGNORED_FILES.contains(&name)
        })
        .filter_map(|e| {
            let path = e.path();
            let rel = path
                .strip_prefix(dir)
                .ok()?
                .to_string_lossy()
                .replace('\\', "/");
            (!ignore.is_ignored(&rel)).then_some((path, rel))
        })
        .collect();
    files.sort_by(|a, b| a.1.cmp(&b.1));
    files
}

/// Whether a content-relative path is a Markdown document.
pub fn is_markdown(rel: &str) -> bool {
    Path::new(rel)
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("md"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn set(patterns: &[&str]) -> IgnoreSet {
        IgnoreSet::new(&patterns.iter().map(|s| s.to_string()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn test_plain_segment_ignores_subtree() {
        let ignore = set(&["private"]);
        assert!(ignore.is_ignored("private"));
        assert!(ignore.is_ignored("private/a/b.md"));
        assert!(!ignore.is_ignored("public/private.md"));
    }

    #[test]
    fn test_globs() {
        let ignore = set(&["*.draft.md", "**/scratch"]);
        assert!(ignore.is_ignored("idea.draft.md"));
        assert!(!ignore.is_ignored("notes/idea.draft.md"));
        assert!(ignore.is_ignored("scratch/x.md"));
        assert!(ignore.is_ignored("a/b/scratch/x.md"));
        assert!(!ignore.is_ignored("a/scratchpad.md"));
    }

    #[test]
    fn test_walk_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::create_dir_all(dir.path().join("private")).unwrap();
        fs::write(dir.path().join("b/z.md"), "z").unwrap();
        fs::write(dir.path().join("a.md"), "a").unwrap();
        fs::write(dir.path().join("private/secret.md"), "s").unwrap();
        fs::write(dir.path().join(".DS_Store"), "").unwrap();

        let files = walk_files(dir.path(), &set(&["private"]));
        let rels: Vec<_> = files.iter().map(|(_, rel)| rel.as_str()).collect();
        assert_eq!(rels, vec!["a.md", "b/z.md"]);
    }

    #[test]
    fn test_walk_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(walk_files(&dir.path().join("nope"), &IgnoreSet::default()).is_empty());
    }
}
