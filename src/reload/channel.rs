//! Live reload subscribers.
//!
//! A connection registered after a broadcast does not see it: there is no
//! replay. A broadcast sends to every open connection and drops the ones
//! whose send fails; other connections are unaffected.

use anyhow::Result;
use parking_lot::Mutex;

/// The only message ever sent.
pub const REBUILD_MESSAGE: &str = "rebuild";

/// One subscriber.
pub trait Connection: Send {
    fn send(&mut self, message: &str) -> Result<()>;

    /// Whether the peer is still there. Polled by the server's reader.
    fn is_open(&mut self) -> bool {
        true
    }
}

pub struct LiveReloadChannel<C> {
    connections: Mutex<Vec<C>>,
}

impl<C> Default for LiveReloadChannel<C> {
    fn default() -> Self {
        Self {
            connections: Mutex::new(Vec::new()),
        }
    }
}

impl<C: Connection> LiveReloadChannel<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, conn: C) {
        let mut connections = self.connections.lock();
        connections.push(conn);
        crate::debug!("reload"; "client connected (total: {})", connections.len());
    }

    /// Send [`REBUILD_MESSAGE`] to everyone; returns how many received it.
    pub fn broadcast(&self) -> usize {
        let mut connections = self.connections.lock();
        if connections.is_empty() {
            crate::debug!("reload"; "no clients connected");
            return 0;
        }

        connections.retain_mut(|conn| match conn.send(REBUILD_MESSAGE) {
            Ok(()) => true,
            Err(e) => {
                crate::debug!("reload"; "client disconnected: {}", e);
                false
            }
        });
        crate::debug!("reload"; "broadcast to {} clients", connections.len());
        connections.len()
    }

    /// Drop connections whose peer went away.
    pub fn prune(&self) {
        self.connections.lock().retain_mut(|conn| conn.is_open());
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    /// Close out every connection.
    pub fn clear(&self) {
        self.connections.lock().clear();
    }
}
