//! Filesystem path normalization.

use std::path::{Path, PathBuf};

/// Absolute form of `path`.
///
/// Uses `canonicalize()` when the path exists (resolving symlinks), and
/// otherwise joins relative paths onto the current directory. Watcher
/// events for removed files still normalize this way.
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_missing_path() {
        let path = Path::new("/no/such/dir/file.md");
        assert_eq!(normalize_path(path), path);
        assert!(normalize_path(Path::new("rel/file.md")).is_absolute());
    }

    #[test]
    fn test_normalize_resolves_symlinked_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("a.md");
        std::fs::write(&file, "x").unwrap();
        assert_eq!(normalize_path(&file), file.canonicalize().unwrap());
    }
}
