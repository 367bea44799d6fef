//! Burst coalescing for raw watcher events.

use std::path::Path;
use std::time::{Duration, Instant};

use super::types::{ChangeKind, ChangeSet};
use crate::utils::path::normalize_path;

pub(super) const DEBOUNCE_MS: u64 = 300;
pub(super) const REBUILD_COOLDOWN_MS: u64 = 800;
const IDLE_SLEEP: Duration = Duration::from_secs(24 * 60 * 60);

/// Folds raw notify events into one [`ChangeSet`] per burst.
pub(super) struct Debouncer {
    pub(super) changes: ChangeSet,
    pub(super) last_event: Option<Instant>,
    pub(super) last_flush: Option<Instant>,
}

impl Debouncer {
    pub(super) fn new() -> Self {
        Self {
            changes: ChangeSet::new(),
            last_event: None,
            last_flush: None,
        }
    }

    /// Add a notify event, folding repeated paths with [`ChangeKind::then`].
    pub(super) fn add_event(&mut self, event: &notify::Event) {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Modify(modify) => {
                // mtime/atime/chmod noise can loop rebuilds that touch sources
                if matches!(modify, notify::event::ModifyKind::Metadata(_)) {
                    return;
                }
                ChangeKind::Modified
            }
            _ => return,
        };

        crate::debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);

        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }
            self.changes.record(normalize_path(path), kind);
            self.last_event = Some(Instant::now());
        }
    }

    /// Take the pending changes once the debounce window and the rebuild
    /// cooldown have both elapsed.
    pub(super) fn take_if_ready(&mut self) -> Option<ChangeSet> {
        if !self.is_ready() {
            return None;
        }

        let changes = std::mem::take(&mut self.changes);
        self.last_event = None;
        self.last_flush = Some(Instant::now());

        let changes = reconcile(changes);
        (!changes.is_empty()).then_some(changes)
    }

    /// Earliest instant a flush may happen, `None` while nothing is pending.
    ///
    /// A flush waits for both a quiet debounce window after the last event
    /// and the cooldown after the previous flush.
    fn ready_at(&self) -> Option<Instant> {
        let last_event = self.last_event?;
        let quiet = last_event + Duration::from_millis(DEBOUNCE_MS);
        let cooled = self
            .last_flush
            .map(|t| t + Duration::from_millis(REBUILD_COOLDOWN_MS));
        Some(cooled.map_or(quiet, |c| c.max(quiet)))
    }

    pub(super) fn is_ready(&self) -> bool {
        !self.changes.is_empty() && self.ready_at().is_some_and(|at| at <= Instant::now())
    }

    /// How long the actor loop may sleep before checking again.
    pub(super) fn sleep_duration(&self) -> Duration {
        match self.ready_at() {
            Some(at) => at
                .saturating_duration_since(Instant::now())
                .max(Duration::from_millis(1)),
            None => IDLE_SLEEP,
        }
    }
}

/// Correct event kinds against what is actually on disk.
///
/// Watchers report stale kinds around atomic saves: `Removed` for a file
/// that was immediately replaced, or `Created` for one already gone.
pub(super) fn reconcile(changes: ChangeSet) -> ChangeSet {
    changes
        .iter()
        .filter_map(|(path, kind)| {
            let exists = path.exists();
            let kind = match kind {
                ChangeKind::Created if !exists => return None,
                ChangeKind::Modified if !exists => ChangeKind::Removed,
                ChangeKind::Removed if exists => ChangeKind::Modified,
                kind => kind,
            };
            Some((path.to_path_buf(), kind))
        })
        .collect()
}

/// Editor swap, backup and hidden files.
pub(super) fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}
