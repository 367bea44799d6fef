//! Server lifecycle management.

use crate::{
    actor::{
        WatchPair,
        fs::{WatchFilter, WatchTarget},
    },
    build::Orchestrator,
    core::register_server,
    log,
    utils::path::normalize_path,
};
use anyhow::{Context, Result};
use crossbeam::channel::{Receiver, Sender};
use std::{
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};
use tiny_http::Server;

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Bind to the specified interface and port, with automatic port retry.
pub fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = String::new();

    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(anyhow::anyhow!(
        "failed to bind after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error
    ))
}

/// Register server for graceful shutdown.
///
/// When Ctrl+C is pressed, the handler set up in `main` unblocks the
/// server and signals `shutdown_tx`.
pub fn register_server_for_shutdown(server: Arc<Server>, shutdown_tx: Sender<()>) {
    register_server(server, shutdown_tx);
}

/// Watch the config files; any change recompiles through the orchestrator.
pub fn watch_config(
    runtime: &tokio::runtime::Handle,
    orchestrator: &Arc<Orchestrator>,
) -> Result<WatchPair> {
    let paths: Vec<PathBuf> = orchestrator
        .config_paths()
        .iter()
        .map(|p| normalize_path(p))
        .collect();

    let targets: Vec<WatchTarget> = paths
        .iter()
        .filter_map(|p| p.parent())
        .map(WatchTarget::dir)
        .collect();

    let filter: WatchFilter = Box::new(move |path: &Path| paths.iter().any(|p| p == path));
    WatchPair::spawn(runtime, "config", &targets, filter, Arc::clone(orchestrator))
        .context("failed to watch config file")
}

/// Wind down the actors once Ctrl+C arrives.
///
/// Stops the config watcher, then retires the loaded program so its
/// content watcher stops too.
pub fn spawn_shutdown_listener(
    shutdown_rx: Receiver<()>,
    config_watch: Option<WatchPair>,
    orchestrator: Arc<Orchestrator>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let _ = shutdown_rx.recv();
        if let Some(pair) = config_watch {
            pair.stop();
        }
        orchestrator.shutdown();
    })
}

/// Wait for the actors to shut down gracefully (max 2 seconds).
pub fn wait_for_shutdown(handle: JoinHandle<()>) {
    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
}
