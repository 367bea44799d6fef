//! FileSystem Actor
//!
//! Watches paths for changes and posts debounced change sets into a build
//! channel. The watcher starts in [`FsActor::new`], so events raised while
//! the caller is still building are buffered rather than lost.
//!
//! ```text
//! notify ──▶ bridge thread ──▶ Debouncer ──▶ filter ──▶ BuildMsg::Rebuild
//! ```

mod debouncer;
mod types;

pub use types::{ChangeKind, ChangeSet};

use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::messages::BuildMsg;
use debouncer::Debouncer;

/// Decides which changed paths are relevant to the consumer.
pub type WatchFilter = Box<dyn Fn(&Path) -> bool + Send + Sync>;

/// A path to subscribe to.
#[derive(Debug, Clone)]
pub struct WatchTarget {
    pub path: PathBuf,
    pub recursive: bool,
}

impl WatchTarget {
    pub fn tree(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            recursive: true,
        }
    }

    /// A single directory level, used to follow one file through atomic saves.
    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            recursive: false,
        }
    }
}

/// FileSystem Actor - watches for file changes
pub struct FsActor {
    /// Channel to receive notify events (sync -> async bridge)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    _watcher: RecommendedWatcher,
    build_tx: mpsc::Sender<BuildMsg>,
    filter: WatchFilter,
    /// Log prefix, distinguishes the config watcher from the content watcher
    label: &'static str,
}

impl FsActor {
    pub fn new(
        label: &'static str,
        targets: &[WatchTarget],
        filter: WatchFilter,
        build_tx: mpsc::Sender<BuildMsg>,
    ) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        // skip non-existent paths: a site may have no static dir
        for target in targets {
            if target.path.exists() {
                let mode = if target.recursive {
                    RecursiveMode::Recursive
                } else {
                    RecursiveMode::NonRecursive
                };
                watcher.watch(&target.path, mode)?;
                crate::debug!(label; "watching {}", target.path.display());
            }
        }

        Ok(Self {
            notify_rx,
            _watcher: watcher,
            build_tx,
            filter,
            label,
        })
    }

    /// Run the actor event loop until the build channel closes.
    pub async fn run(self) {
        let Self {
            notify_rx,
            _watcher,
            build_tx,
            filter,
            label,
        } = self;
        let mut debouncer = Debouncer::new();

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);

        // exits once the watcher (and with it the notify sender) is dropped
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => crate::log!("watch"; "notify error: {}", e),
                }
            }
        });

        loop {
            tokio::select! {
                biased;
                event = async_rx.recv() => match event {
                    Some(event) => debouncer.add_event(&event),
                    None => break,
                },
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    let Some(mut changes) = debouncer.take_if_ready() else {
                        continue;
                    };
                    changes.retain(|path, _| filter(path));
                    if changes.is_empty() {
                        continue;
                    }
                    for (path, kind) in changes.iter() {
                        crate::debug!(label; "{}: {}", kind.label(), path.display());
                    }
                    if build_tx.send(BuildMsg::Rebuild(changes)).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
