use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// What happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }

    /// Fold a later event for the same path into an earlier one.
    ///
    /// `None` means the two cancel out.
    pub(crate) fn then(self, next: Self) -> Option<Self> {
        match (self, next) {
            // deleted, then restored
            (Self::Removed, Self::Created | Self::Modified) => Some(Self::Modified),
            (Self::Modified, Self::Removed) => Some(Self::Removed),
            // appeared, then vanished
            (Self::Created, Self::Removed) => None,
            // first wins
            (first, _) => Some(first),
        }
    }
}

/// Debounced file changes, one entry per path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: BTreeMap<PathBuf, ChangeKind>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change, folding it into any earlier change of the same path.
    pub fn record(&mut self, path: PathBuf, kind: ChangeKind) {
        match self.changes.get(&path) {
            Some(&existing) => match existing.then(kind) {
                Some(kind) => {
                    self.changes.insert(path, kind);
                }
                None => {
                    self.changes.remove(&path);
                }
            },
            None => {
                self.changes.insert(path, kind);
            }
        }
    }

    /// Merge a later change set into this one.
    pub fn merge(&mut self, later: ChangeSet) {
        for (path, kind) in later.changes {
            self.record(path, kind);
        }
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&Path, ChangeKind) -> bool) {
        self.changes.retain(|p, k| keep(p, *k));
    }

    #[cfg(test)]
    pub fn get(&self, path: &Path) -> Option<ChangeKind> {
        self.changes.get(path).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, ChangeKind)> {
        self.changes.iter().map(|(p, k)| (p.as_path(), *k))
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.changes.keys().map(PathBuf::as_path)
    }

    /// Whether every change is a modification of a path accepted by `pred`.
    pub fn only_modified(&self, pred: impl Fn(&Path) -> bool) -> bool {
        !self.is_empty()
            && self
                .changes
                .iter()
                .all(|(p, k)| *k == ChangeKind::Modified && pred(p))
    }

    /// Short human summary: the path when one file changed, else a count.
    pub fn describe(&self) -> String {
        match self.changes.iter().next() {
            Some((path, kind)) if self.len() == 1 => format!("{}: {}", kind.label(), path.display()),
            _ => format!("{} files changed", self.len()),
        }
    }
}

impl FromIterator<(PathBuf, ChangeKind)> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = (PathBuf, ChangeKind)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (path, kind) in iter {
            set.record(path, kind);
        }
        set
    }
}
