//! WebSocket Server for Live Reload
//!
//! An acceptor thread performs the handshake and registers each client
//! with the [`LiveReloadChannel`]; a reader thread polls clients so closed
//! sockets are pruned between broadcasts.

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use super::channel::{Connection, LiveReloadChannel};

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A client that stalls mid-handshake is dropped after this long.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// A browser connected over WebSocket.
pub struct WsConnection {
    ws: WebSocket<TcpStream>,
}

impl Connection for WsConnection {
    fn send(&mut self, message: &str) -> Result<()> {
        self.ws.send(Message::Text(message.into()))?;
        Ok(())
    }

    fn is_open(&mut self) -> bool {
        match self.ws.read() {
            Ok(Message::Close(_)) => false,
            Ok(_) => true,
            Err(tungstenite::Error::Io(e)) if e.kind() == ErrorKind::WouldBlock => true,
            Err(_) => false,
        }
    }
}

/// Bind the reload socket and start serving; returns the bound port.
pub fn start_reload_server(
    interface: IpAddr,
    base_port: u16,
    channel: Arc<LiveReloadChannel<WsConnection>>,
) -> Result<u16> {
    let (listener, actual_port) = try_bind_port(interface, base_port)?;
    listener.set_nonblocking(true)?;
    if actual_port != base_port {
        crate::log!("reload"; "port {} in use, using {} instead", base_port, actual_port);
    }

    let acceptor = Arc::clone(&channel);
    std::thread::spawn(move || accept_loop(&listener, &acceptor));
    std::thread::spawn(move || reader_loop(&channel));

    Ok(actual_port)
}

fn accept_loop(listener: &TcpListener, channel: &LiveReloadChannel<WsConnection>) {
    while !crate::core::is_shutdown() {
        match listener.accept() {
            Ok((stream, addr)) => {
                crate::debug!("reload"; "client connected: {}", addr);
                // blocking with a deadline for the handshake, non-blocking
                // for liveness polls
                if let Err(e) = prepare_handshake(&stream) {
                    crate::log!("reload"; "dropping {}: {}", addr, e);
                    continue;
                }
                match tungstenite::accept(stream) {
                    Ok(ws) => {
                        let stream = ws.get_ref();
                        let _ = stream.set_read_timeout(None);
                        let _ = stream.set_write_timeout(None);
                        let _ = stream.set_nonblocking(true);
                        channel.register(WsConnection { ws });
                    }
                    Err(e) => crate::log!("reload"; "handshake failed: {}", e),
                }
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => std::thread::sleep(POLL_INTERVAL),
            Err(e) => {
                crate::log!("reload"; "accept error: {}", e);
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }
    channel.clear();
}

fn prepare_handshake(stream: &TcpStream) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
    stream.set_write_timeout(Some(HANDSHAKE_TIMEOUT))
}

fn reader_loop(channel: &LiveReloadChannel<WsConnection>) {
    while !crate::core::is_shutdown() {
        std::thread::sleep(POLL_INTERVAL);
        channel.prune();
    }
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(interface: IpAddr, base_port: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(SocketAddr::new(interface, port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "failed to bind reload server after {} attempts: {}",
        MAX_PORT_RETRIES,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}
