//! The build critical section and its staleness check.
//!
//! ```text
//! request ──issue()──▶ ticket t ──lock.write()──▶ is_stale(t)? ──yes──▶ Superseded
//!                                                      │
//!                                                      no ──▶ build
//! ```

use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared by builds (exclusive) and HTTP requests (shared).
pub type BuildLock = Arc<RwLock<()>>;

pub fn new_lock() -> BuildLock {
    Arc::new(RwLock::new(()))
}

/// A position in the request sequence. Later requests get larger tickets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Monotonic ticket source.
#[derive(Debug, Default)]
pub struct Ticketer {
    latest: AtomicU64,
}

impl Ticketer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether a ticket newer than `ticket` has been issued.
    pub fn is_stale(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) > ticket.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_latest_ticket_is_fresh() {
        let ticketer = Ticketer::new();
        let a = ticketer.issue();
        assert!(!ticketer.is_stale(a));

        let b = ticketer.issue();
        assert!(a < b);
        assert!(ticketer.is_stale(a));
        assert!(!ticketer.is_stale(b));
    }

    #[test]
    fn test_tickets_unique_across_threads() {
        let ticketer = Arc::new(Ticketer::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let t = Arc::clone(&ticketer);
                std::thread::spawn(move || (0..100).map(|_| t.issue().get()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 800);
        assert_eq!(all.last(), Some(&800));
    }
}
