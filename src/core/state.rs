//! Ctrl+C handling and the process-wide shutdown flag.
//!
//! Until the dev server registers itself, Ctrl+C exits on the spot: a
//! single-shot build has nothing to wind down. Afterwards it flips the flag,
//! wakes the shutdown listener and unblocks the HTTP accept loop.

use anyhow::{Result, anyhow};
use crossbeam::channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tiny_http::Server;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Set once by the dev server.
static SERVING: OnceLock<Serving> = OnceLock::new();

struct Serving {
    server: Arc<Server>,
    wake: Sender<()>,
}

pub fn setup_shutdown_handler() -> Result<()> {
    ctrlc::set_handler(on_interrupt).map_err(|e| anyhow!("cannot install Ctrl+C handler: {e}"))
}

fn on_interrupt() {
    SHUTDOWN.store(true, Ordering::SeqCst);

    let Some(serving) = SERVING.get() else {
        std::process::exit(0);
    };

    crate::log!("serve"; "shutting down...");
    // The listener may already be gone.
    let _ = serving.wake.send(());
    serving.server.unblock();
}

/// Hand the bound server and the listener's wake-up channel to the handler.
pub fn register_server(server: Arc<Server>, wake: Sender<()>) {
    let _ = SERVING.set(Serving { server, wake });
}

/// Polling loops may observe the flag one iteration late.
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}
