//! The peer directory: `(ip, listen_port) -> Peer`, matching the original's
//! `self.peers` dict keyed by the peer's advertised listening address
//! rather than the ephemeral source port of its connection (§3, §5).

use crate::conn::Peer;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

/// The address a peer is reachable at: its IP plus the port it listens on
/// (not the source port of whichever socket happened to connect first).
pub type PeerKey = (IpAddr, u16);

#[derive(Default)]
pub struct PeerDirectory {
    peers: HashMap<PeerKey, Arc<Peer>>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: PeerKey, peer: Arc<Peer>) {
        self.peers.insert(key, peer);
    }

    pub fn remove(&mut self, key: &PeerKey) -> Option<Arc<Peer>> {
        self.peers.remove(key)
    }

    pub fn get(&self, key: &PeerKey) -> Option<&Arc<Peer>> {
        self.peers.get(key)
    }

    pub fn contains(&self, key: &PeerKey) -> bool {
        self.peers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &Arc<Peer>> {
        self.peers.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PeerKey> {
        self.peers.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::Peer;
    use imgchain_core::UserId;
    use std::net::{TcpListener, TcpStream};

    fn dummy_peer() -> Arc<Peer> {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let stream = TcpStream::connect(addr).unwrap();
        Arc::new(Peer::new(
            stream,
            addr,
            UserId::random(),
            "peer".to_string(),
            addr.port(),
        ))
    }

    #[test]
    fn insert_and_lookup_round_trip() {
        let mut dir = PeerDirectory::new();
        let key: PeerKey = ("127.0.0.1".parse().unwrap(), 9001);
        dir.insert(key, dummy_peer());
        assert!(dir.contains(&key));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn remove_drops_the_entry() {
        let mut dir = PeerDirectory::new();
        let key: PeerKey = ("127.0.0.1".parse().unwrap(), 9002);
        dir.insert(key, dummy_peer());
        assert!(dir.remove(&key).is_some());
        assert!(dir.is_empty());
    }
}
