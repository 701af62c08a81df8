//! Wires the tracker handshake, peer dialing, chain bootstrap, and the
//! node's background threads together into the one entry point a CLI or
//! GUI front end needs (§4.7, §5).

use crate::bootstrap::bootstrap_chain;
use crate::error::Result;
use crate::listener::{dial_peers, run_accept_loop};
use crate::mining::run_mining_poll_loop;
use crate::node::Node;
use crate::tracker::{self, LoginPrompts};
use imgchain_core::Config;
use imgchain_net::PeerDirectory;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use tracing::info;

/// A running node plus the join handles for its background threads.
pub struct Running {
    pub node: Arc<Node>,
    accept_thread: Option<thread::JoinHandle<()>>,
    mining_thread: Option<thread::JoinHandle<()>>,
}

impl Running {
    /// Clears `node.running` and waits for both background threads to exit.
    pub fn shutdown(mut self) {
        self.node.running.store(false, std::sync::atomic::Ordering::Relaxed);
        if let Some(h) = self.accept_thread.take() {
            let _ = h.join();
        }
        if let Some(h) = self.mining_thread.take() {
            let _ = h.join();
        }
    }
}

/// Logs into the tracker, dials the peers it hands back, bootstraps the
/// chain from them (or mines a fresh genesis alone), and starts the
/// accept loop and mining-poll loop on their own threads.
///
/// `listen_port` of `0` lets the OS choose an ephemeral port; the actual
/// bound port is what gets advertised to the tracker and to peers. The
/// original binds its *tracker-facing* socket to a caller-chosen port and
/// always lets the OS pick the listener's port; `std::net` has no portable
/// way to bind a `TcpStream`'s source port before connecting, so this
/// supplies the caller-chosen port to the listener instead, where it's
/// actually useful (see DESIGN.md).
pub fn bootstrap_and_run(
    listen_port: u16,
    tracker_addr: SocketAddr,
    prompts: &dyn LoginPrompts,
    config: Config,
) -> Result<Running> {
    let listener = TcpListener::bind(("0.0.0.0", listen_port))?;
    let actual_port = listener.local_addr()?.port();

    let mut tracker_stream = TcpStream::connect(tracker_addr)?;
    let identity = tracker::login(&mut tracker_stream, actual_port, prompts)?;
    let peer_infos = tracker::get_peers(&mut tracker_stream)?;
    drop(tracker_stream);

    info!(user = %identity.username, port = actual_port, "logged into tracker");

    let dialed = dial_peers(&identity, &peer_infos);
    let peer_list: Vec<_> = dialed.iter().map(|(_, peer)| peer.clone()).collect();
    let chain = bootstrap_chain(&peer_list, &config)?;

    let mut directory = PeerDirectory::new();
    for (key, peer) in dialed {
        directory.insert(key, peer);
    }

    let node = Node::new(identity, config, chain, directory);

    let accept_node = node.clone();
    let accept_thread = thread::spawn(move || run_accept_loop(accept_node, listener));

    let mining_node = node.clone();
    let mining_thread = thread::spawn(move || run_mining_poll_loop(mining_node));

    Ok(Running {
        node,
        accept_thread: Some(accept_thread),
        mining_thread: Some(mining_thread),
    })
}
