//! Shared config with atomic reload support.
//!
//! The handle is the compiler's persisted context: recompiles swap in a
//! freshly loaded config, while readers (HTTP handlers, the reload script
//! host) keep lock-free access through `arc-swap`.

use super::{Overrides, SiteConfig};
use anyhow::Result;
use arc_swap::ArcSwap;
use crate::utils::hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct ConfigHandle {
    path: PathBuf,
    overrides: Overrides,
    current: ArcSwap<SiteConfig>,
    /// Hash of the config file content at the last successful load.
    hash: AtomicU64,
}

impl ConfigHandle {
    /// Load the config for the first time.
    pub fn load(path: &Path, overrides: Overrides) -> Result<Self> {
        let config = SiteConfig::load(path, &overrides)?;
        Ok(Self {
            path: path.to_path_buf(),
            hash: AtomicU64::new(file_hash(path)),
            overrides,
            current: ArcSwap::from_pointee(config),
        })
    }

    #[inline]
    pub fn get(&self) -> Arc<SiteConfig> {
        self.current.load_full()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reload from disk if the file content changed.
    ///
    /// Returns `Ok(true)` if the config was replaced. On error the previous
    /// config stays active.
    pub fn reload(&self) -> Result<bool> {
        let new_hash = file_hash(&self.path);
        if new_hash == self.hash.load(Ordering::Relaxed) {
            return Ok(false);
        }

        let config = SiteConfig::load(&self.path, &self.overrides)?;
        self.current.store(Arc::new(config));
        self.hash.store(new_hash, Ordering::Relaxed);
        Ok(true)
    }
}

/// Content hash of the config file; 0 when unreadable or missing.
fn file_hash(path: &Path) -> u64 {
    std::fs::read(path).map(|bytes| hash::compute(&bytes)).unwrap_or(0)
}
