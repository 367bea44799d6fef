//! Actor System for Watch Mode
//!
//! Message-passing concurrency between file watchers and rebuilds:
//!
//! ```text
//! FsActor --BuildMsg--> BuildActor --> RebuildHandler
//! (watch)   (mpsc)     (merge bursts)   (orchestrator / content rebuild)
//! ```
//!
//! Two watch pairs run in serve mode. The outer one follows the config
//! file and recompiles through the orchestrator. The inner one follows
//! content and static files; it belongs to the loaded program and is
//! stopped by its teardown.
//!
//! # Module Structure
//!
//! - `messages` - Message types for inter-actor communication
//! - `fs` - File system watcher with debouncing
//! - `build` - Single consumer that runs rebuilds

pub mod build;
pub mod fs;
pub mod messages;

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use build::{BuildActor, RebuildHandler};
use fs::{FsActor, WatchFilter, WatchTarget};
use messages::BuildMsg;

const CHANNEL_BUFFER: usize = 32;

/// A running watcher and its build consumer.
pub struct WatchPair {
    fs: JoinHandle<()>,
    build: JoinHandle<()>,
    tx: mpsc::Sender<BuildMsg>,
}

impl WatchPair {
    /// Start watching `targets` on `runtime`, feeding `handler`.
    pub fn spawn<H: RebuildHandler>(
        runtime: &Handle,
        label: &'static str,
        targets: &[WatchTarget],
        filter: WatchFilter,
        handler: Arc<H>,
    ) -> notify::Result<Self> {
        let (tx, rx) = mpsc::channel::<BuildMsg>(CHANNEL_BUFFER);
        let fs_actor = FsActor::new(label, targets, filter, tx.clone())?;
        let build_actor = BuildActor::new(rx, handler);

        Ok(Self {
            fs: runtime.spawn(fs_actor.run()),
            build: runtime.spawn(build_actor.run()),
            tx,
        })
    }

    /// Abort both tasks. Does not wait for a rebuild in progress.
    pub fn stop(&self) {
        let _ = self.tx.try_send(BuildMsg::Shutdown);
        self.fs.abort();
        self.build.abort();
    }
}
