//! The rendezvous tracker (§4.7, §11): keeps one entry per connecting
//! address, hands new arrivals either a fresh-identity prompt or their
//! last-seen identity, then the table of other active peers, and finally
//! polls the connection to notice when a peer goes away.

use imgchain_core::UserId;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long the liveness poll sleeps between 1-byte reads, matching the
/// original's `sleep(1)` inside its keep-alive loop.
const LIVENESS_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
struct TrackedUser {
    user_id: UserId,
    username: String,
    listen_port: u16,
    active: bool,
}

/// Shared state: one entry per address that has ever connected, keyed by
/// the connection's own (ip, source port) — not the peer's advertised
/// listen port, matching the original's `self.users[addr]`.
#[derive(Default)]
pub struct Tracker {
    users: Mutex<HashMap<SocketAddr, TrackedUser>>,
}

impl Tracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Binds `port` on all interfaces and serves connections until the
    /// process is killed, matching the original's fire-and-forget tracker.
    pub fn run(self: Arc<Self>, port: u16) -> std::io::Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        info!(port, "tracker listening");
        loop {
            let (stream, addr) = listener.accept()?;
            let tracker = self.clone();
            thread::spawn(move || tracker.handle_connection(stream, addr));
        }
    }

    /// Serves one accepted connection end to end: greets it, then polls for
    /// liveness until it closes. Public so integration tests can drive it
    /// directly against a loopback socket pair without going through `run`.
    pub fn handle_connection(self: Arc<Self>, mut stream: TcpStream, addr: SocketAddr) {
        info!(%addr, "new connection");
        if let Err(e) = self.greet(&mut stream, addr) {
            warn!(%addr, error = %e, "tracker handshake failed");
            return;
        }

        loop {
            let mut byte = [0u8; 1];
            match stream.read(&mut byte) {
                Ok(0) | Err(_) => {
                    if let Some(user) = self.users.lock().unwrap().get_mut(&addr) {
                        user.active = false;
                    }
                    debug!(%addr, "connection closed");
                    return;
                }
                Ok(_) => thread::sleep(LIVENESS_POLL_INTERVAL),
            }
        }
    }

    fn greet(&self, stream: &mut TcpStream, addr: SocketAddr) -> std::io::Result<()> {
        let prior = self.users.lock().unwrap().get(&addr).cloned();
        match &prior {
            None => stream.write_all(b"NEW")?,
            Some(user) => {
                let mut hello = Vec::with_capacity(64);
                hello.extend_from_slice(user.user_id.as_bytes());
                hello.extend_from_slice(&pad32(&user.username));
                stream.write_all(&hello)?;
            }
        }

        let mut hello = [0u8; 66];
        stream.read_exact(&mut hello)?;
        let user_id = UserId::from_wire(&hello[0..32])
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "bad user id"))?;
        let username = unpad(&hello[32..64]);
        let listen_port = u16::from_be_bytes([hello[64], hello[65]]);

        self.users.lock().unwrap().insert(
            addr,
            TrackedUser {
                user_id,
                username,
                listen_port,
                active: true,
            },
        );

        self.send_active_peers(stream, addr)
    }

    fn send_active_peers(&self, stream: &mut TcpStream, requester: SocketAddr) -> std::io::Result<()> {
        let users = self.users.lock().unwrap();
        let rows: Vec<(SocketAddr, TrackedUser)> = users
            .iter()
            .filter(|(a, u)| **a != requester && u.active)
            .map(|(a, u)| (*a, u.clone()))
            .collect();
        drop(users);

        let mut out = Vec::with_capacity(4 + rows.len() * 70);
        out.extend_from_slice(&(rows.len() as u32).to_be_bytes());
        for (addr, user) in rows {
            let IpAddr::V4(ip) = addr.ip() else {
                continue;
            };
            out.extend_from_slice(&ip.octets());
            out.extend_from_slice(&user.listen_port.to_be_bytes());
            out.extend_from_slice(user.user_id.as_bytes());
            out.extend_from_slice(&pad32(&user.username));
        }
        stream.write_all(&out)
    }
}

fn pad32(s: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    let bytes = s.as_bytes();
    let n = bytes.len().min(32);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

fn unpad(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
