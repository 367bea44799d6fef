//! Build Actor - the single consumer of rebuild requests.
//!
//! Bursts of messages are drained with `try_recv` and merged into one
//! change set before the handler runs, so a flurry of saves costs one
//! rebuild. The handler runs on a blocking thread; changes from a
//! superseded rebuild are carried into the next one.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::fs::ChangeSet;
use super::messages::BuildMsg;
use crate::build::{BuildStatus, Orchestrator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    Done,
    /// Another build took over; the changes were not consumed.
    Superseded,
}

pub trait RebuildHandler: Send + Sync + 'static {
    fn rebuild(&self, changes: &ChangeSet) -> RebuildOutcome;
}

/// Config changes recompile through the orchestrator.
impl RebuildHandler for Orchestrator {
    fn rebuild(&self, changes: &ChangeSet) -> RebuildOutcome {
        match self.request_build(&changes.describe()) {
            Ok(BuildStatus::Superseded) => RebuildOutcome::Superseded,
            Ok(_) => RebuildOutcome::Done,
            Err(e) => {
                crate::log!("error"; "{e:#}");
                RebuildOutcome::Done
            }
        }
    }
}

pub struct BuildActor<H> {
    rx: mpsc::Receiver<BuildMsg>,
    handler: Arc<H>,
}

impl<H: RebuildHandler> BuildActor<H> {
    pub fn new(rx: mpsc::Receiver<BuildMsg>, handler: Arc<H>) -> Self {
        Self { rx, handler }
    }

    /// Run until the channel closes or a shutdown message arrives.
    pub async fn run(mut self) {
        let mut carried = ChangeSet::new();

        while let Some(msg) = self.rx.recv().await {
            let mut changes = std::mem::take(&mut carried);
            let BuildMsg::Rebuild(first) = msg else {
                break;
            };
            changes.merge(first);

            let mut shutdown = false;
            while let Ok(msg) = self.rx.try_recv() {
                match msg {
                    BuildMsg::Rebuild(more) => changes.merge(more),
                    BuildMsg::Shutdown => {
                        shutdown = true;
                        break;
                    }
                }
            }
            if shutdown {
                break;
            }
            if changes.is_empty() {
                continue;
            }

            let handler = Arc::clone(&self.handler);
            let result = tokio::task::spawn_blocking(move || {
                let outcome = handler.rebuild(&changes);
                (outcome, changes)
            })
            .await;

            match result {
                Ok((RebuildOutcome::Superseded, changes)) => carried = changes,
                Ok((RebuildOutcome::Done, _)) => {}
                Err(e) => crate::log!("error"; "rebuild task failed: {e}"),
            }
        }
        crate::debug!("build"; "actor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::fs::ChangeKind;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<Vec<PathBuf>>>,
        supersede_first: bool,
    }

    impl RebuildHandler for Recorder {
        fn rebuild(&self, changes: &ChangeSet) -> RebuildOutcome {
            let mut calls = self.calls.lock();
            calls.push(changes.paths().map(PathBuf::from).collect());
            if self.supersede_first && calls.len() == 1 {
                RebuildOutcome::Superseded
            } else {
                RebuildOutcome::Done
            }
        }
    }

    fn change(path: &str) -> BuildMsg {
        BuildMsg::Rebuild([(PathBuf::from(path), ChangeKind::Modified)].into_iter().collect())
    }

    #[tokio::test]
    async fn test_burst_is_merged_into_one_rebuild() {
        let (tx, rx) = mpsc::channel(8);
        for path in ["/s/a.md", "/s/b.md", "/s/a.md"] {
            tx.send(change(path)).await.unwrap();
        }
        drop(tx);

        let recorder = Arc::new(Recorder::default());
        BuildActor::new(rx, Arc::clone(&recorder)).run().await;

        let calls = recorder.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec![PathBuf::from("/s/a.md"), PathBuf::from("/s/b.md")]);
    }

    #[tokio::test]
    async fn test_superseded_changes_are_carried() {
        let (tx, rx) = mpsc::channel(8);
        let recorder = Arc::new(Recorder {
            supersede_first: true,
            ..Recorder::default()
        });
        let task = tokio::spawn(BuildActor::new(rx, Arc::clone(&recorder)).run());

        tx.send(change("/s/a.md")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(change("/s/b.md")).await.unwrap();
        drop(tx);
        task.await.unwrap();

        let calls = recorder.calls.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], vec![PathBuf::from("/s/a.md"), PathBuf::from("/s/b.md")]);
    }

    #[tokio::test]
    async fn test_shutdown_stops_actor() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(BuildMsg::Shutdown).await.unwrap();
        tx.send(change("/s/a.md")).await.unwrap();

        let recorder = Arc::new(Recorder::default());
        BuildActor::new(rx, Arc::clone(&recorder)).run().await;
        assert!(recorder.calls.lock().is_empty());
    }
}
