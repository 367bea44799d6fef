//! Hashing helpers.
//!
//! - [`compute`]: FxHash, for cheap change detection of small inputs
//!   (the config file).
//! - [`ContentHash`]: blake3, for deciding whether an output file must be
//!   rewritten.

use rustc_hash::FxHasher;
use std::fs::File;
use std::hash::Hasher;
use std::io::{self, BufReader};
use std::path::Path;

/// Compute 64-bit hash from byte data.
#[inline]
pub fn compute<T: AsRef<[u8]> + ?Sized>(data: &T) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(data.as_ref());
    hasher.finish()
}

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    #[inline]
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Hash a file by streaming it. `Ok(None)` when the file does not exist.
    pub fn of_file(path: &Path) -> io::Result<Option<Self>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut hasher = blake3::Hasher::new();
        hasher.update_reader(BufReader::new(file))?;
        Ok(Some(Self(*hasher.finalize().as_bytes())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_compute_is_deterministic() {
        assert_eq!(compute("abc"), compute(b"abc"));
        assert_ne!(compute("abc"), compute("abd"));
    }

    #[test]
    fn test_file_hash_matches_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"hello").unwrap();
        assert_eq!(ContentHash::of_file(&path).unwrap(), Some(ContentHash::of(b"hello")));
        assert_eq!(ContentHash::of_file(&dir.path().join("missing")).unwrap(), None);
    }
}
