//! Actor Message Definitions
//!
//! ```text
//! FsActor --Rebuild(changes)--> BuildActor --> RebuildHandler
//! ```

use super::fs::ChangeSet;

/// Messages to the build actor
#[derive(Debug)]
pub enum BuildMsg {
    /// Debounced changes from a watcher
    Rebuild(ChangeSet),
    Shutdown,
}
