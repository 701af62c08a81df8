//! Inbound connection handling and outbound peer dialing (§4.6, §5).
//!
//! Two directions of a peer pair get two separate sockets: whichever side
//! dials out keeps that socket in its [`imgchain_net::PeerDirectory`] and
//! uses it for every request/broadcast it sends that peer; the accepting
//! side answers requests directly on the socket it accepted. A node that
//! receives an inbound hello from an address it doesn't already know dials
//! back so it, too, has an outbound channel to that peer — mirroring the
//! original's `handle_connection` spawning its own `connect_to_peer`.

use crate::error::Result;
use crate::identity::Identity;
use crate::node::Node;
use crate::tracker::PeerInfo;
use crate::wire_strings::{pad_bytes, unpad_bytes};
use imgchain_core::{Block, Transaction, UserId};
use imgchain_net::conn::{recv_exact, recv_tag, recv_until_end};
use imgchain_net::{Peer, PeerKey, Tag};
use std::io::Write;
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Runs the accept loop on `listener` until `node.running` is cleared,
/// using a read timeout so the loop can periodically notice shutdown
/// instead of blocking in `accept` forever (matches the original's 2s
/// `socket.settimeout`).
pub fn run_accept_loop(node: Arc<Node>, listener: TcpListener) {
    listener
        .set_nonblocking(true)
        .expect("listener socket supports non-blocking mode");
    let poll_interval = node.config.accept_loop_timeout / 8;
    loop {
        if !node.running.load(Ordering::Relaxed) {
            return;
        }
        match listener.accept() {
            Ok((stream, addr)) => {
                let node = node.clone();
                let _ = stream.set_nonblocking(false);
                thread::spawn(move || handle_connection(node, stream, addr));
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(poll_interval);
            }
            Err(e) => {
                warn!(error = %e, "accept loop error");
            }
        }
    }
}

/// Dials every peer the tracker handed back, in parallel, waits for all
/// attempts to finish, and returns the ones that succeeded. Used both
/// before a [`Node`] exists (startup bootstrap) and isn't tied to one.
pub fn dial_peers(identity: &Identity, peers: &[PeerInfo]) -> Vec<(PeerKey, Arc<Peer>)> {
    let handles: Vec<_> = peers
        .iter()
        .cloned()
        .map(|info| {
            let identity = identity.clone();
            thread::spawn(move || {
                let key: PeerKey = (IpAddr::V4(info.ip), info.port);
                match dial(&identity, key, info.user_id, info.username) {
                    Ok(peer) => Some((key, peer)),
                    Err(e) => {
                        debug!(?key, error = %e, "failed to connect to peer from tracker list");
                        None
                    }
                }
            })
        })
        .collect();
    handles.into_iter().filter_map(|h| h.join().ok().flatten()).collect()
}

/// Dials `key` directly and, on `AOK`, returns the resulting outbound peer
/// connection. Pure: doesn't touch any [`Node`] state.
pub fn dial(identity: &Identity, key: PeerKey, user_id: UserId, username: String) -> Result<Arc<Peer>> {
    let addr = SocketAddr::new(key.0, key.1);
    let stream = TcpStream::connect(addr)?;
    send_hello(&stream, identity)?;

    let mut reader = stream.try_clone()?;
    let ack = recv_exact(&mut reader, Tag::LEN)?;
    if ack != Tag::AllOk.as_bytes() {
        return Err(crate::error::Error::HandshakeRejected(addr));
    }

    let peer = Peer::new(stream, addr, user_id, username, key.1);
    info!(?key, "connected to peer");
    Ok(Arc::new(peer))
}

/// Dials `key` on behalf of an already-running node and, on success, stores
/// the connection in its peer directory (used when an inbound hello
/// reveals a peer we don't already have an outbound channel to).
fn connect_to_peer(node: &Arc<Node>, key: PeerKey, user_id: UserId, username: String) -> Result<()> {
    let peer = dial(&node.identity, key, user_id, username)?;
    node.lock_state().peers.insert(key, peer);
    Ok(())
}

fn send_hello(mut stream: &TcpStream, identity: &Identity) -> Result<()> {
    let mut hello = Vec::with_capacity(66);
    hello.extend_from_slice(identity.user_id.as_bytes());
    hello.extend_from_slice(&pad_bytes::<32>(&identity.username));
    hello.extend_from_slice(&identity.listen_port.to_be_bytes());
    stream.write_all(&hello)?;
    Ok(())
}

/// Serves one inbound peer connection: reads its hello, dials back if this
/// is a new peer, acknowledges, then routes tagged requests until the
/// connection closes.
fn handle_connection(node: Arc<Node>, mut stream: TcpStream, addr: SocketAddr) {
    let hello = match recv_exact(&mut stream, 66) {
        Ok(h) => h,
        Err(_) => return,
    };
    let user_id = match UserId::from_wire(&hello[0..32]) {
        Ok(id) => id,
        Err(_) => return,
    };
    let username = unpad_bytes(&hello[32..64]);
    let listen_port = u16::from_be_bytes([hello[64], hello[65]]);

    let key: PeerKey = (addr.ip(), listen_port);
    if !node.lock_state().peers.contains(&key) {
        let node = node.clone();
        let user_id = user_id;
        let username = username.clone();
        thread::spawn(move || {
            let _ = connect_to_peer(&node, key, user_id, username);
        });
    }

    if stream.write_all(&Tag::AllOk.as_bytes()).is_err() {
        return;
    }

    loop {
        if !node.running.load(Ordering::Relaxed) {
            return;
        }
        let tag = match recv_tag(&mut stream) {
            Ok(tag) => tag,
            Err(_) => {
                debug!(%addr, "peer connection closed");
                node.lock_state().peers.remove(&key);
                return;
            }
        };

        match tag {
            Tag::BlockchainRequested => {
                let dump = node.lock_state().chain.encode();
                if let Ok(dump) = dump {
                    let mut payload = dump;
                    payload.extend_from_slice(&imgchain_net::frame::END);
                    let _ = stream.write_all(&payload);
                }
            }
            Tag::NewTransaction => {
                if let Ok(bytes) = recv_until_end(&mut stream) {
                    if let Ok(tx) = Transaction::decode(&bytes) {
                        let _ = node.add_transaction(tx, false);
                    }
                }
            }
            Tag::NewBlock => {
                if let Ok(bytes) = recv_until_end(&mut stream) {
                    match Block::decode(&bytes) {
                        Ok(block) => {
                            let accepted = node.receive_block(block);
                            let reply = if accepted { Tag::AllOk } else { Tag::Failure };
                            let _ = stream.write_all(&reply.as_bytes());
                        }
                        Err(_) => {
                            let _ = stream.write_all(&Tag::Failure.as_bytes());
                        }
                    }
                }
            }
            Tag::NewImage => {
                if let Ok(bytes) = recv_until_end(&mut stream) {
                    if bytes.len() >= imgchain_core::ImageId::LEN {
                        if let Ok(image_id) = imgchain_core::ImageId::from_wire(&bytes[..imgchain_core::ImageId::LEN]) {
                            let data = bytes[imgchain_core::ImageId::LEN..].to_vec();
                            node.lock_state().store.put_with_id(image_id, data);
                        }
                    }
                }
            }
            Tag::GetImage => {
                if let Ok(id_bytes) = recv_exact(&mut stream, imgchain_core::ImageId::LEN) {
                    if let Ok(image_id) = imgchain_core::ImageId::from_wire(&id_bytes) {
                        let data = node.lock_state().store.get(&image_id).map(|b| b.to_vec());
                        match data {
                            Some(bytes) => {
                                let mut payload = bytes;
                                payload.extend_from_slice(&imgchain_net::frame::END);
                                let _ = stream.write_all(&payload);
                            }
                            None => {
                                let _ = stream.write_all(&Tag::Failure.as_bytes());
                            }
                        }
                    }
                }
            }
            Tag::NewDifficulty => {
                if let Ok(bytes) = recv_exact(&mut stream, 2) {
                    let difficulty = u16::from_be_bytes(bytes.try_into().unwrap()) as u32;
                    node.update_difficulty(Some(difficulty));
                }
            }
            Tag::AllOk | Tag::Failure => {
                // Acks to our own requests are consumed synchronously by
                // the sender on its own socket; unsolicited here.
                warn!(%addr, ?tag, "unexpected ack tag on an inbound connection");
            }
        }
    }
}
