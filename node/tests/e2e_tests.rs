//! Loopback multi-node scenarios run over real `TcpListener`s, grounding
//! the end-to-end properties: bootstrap consensus, mint-and-transfer,
//! fork races, and duplicate-mint refusal.

use imgchain_core::miner::mine_blocking;
use imgchain_core::{BlockHash, Chain, Config};
use imgchain_net::{Peer, PeerDirectory, Tag};
use imgchain_node::bootstrap::bootstrap_chain;
use imgchain_node::node::{MintOutcome, Node, TransferOutcome};
use imgchain_node::Identity;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn fast_config() -> Config {
    Config {
        running_difficulty: 0,
        genesis_difficulty: 0,
        mining_poll_interval: Duration::from_millis(10),
        mining_trial_sleep: Duration::from_micros(5),
        accept_loop_timeout: Duration::from_millis(200),
    }
}

fn spin_node(username: &str) -> Arc<Node> {
    let genesis = mine_blocking(BlockHash::zero(), Vec::new(), 0);
    let chain = Chain::with_genesis(genesis, 0);
    let identity = Identity::new(imgchain_core::UserId::random(), username.to_string(), 0);
    Node::new(identity, fast_config(), chain, PeerDirectory::new())
}

/// Dials `addr` with a bare socket (no hello, no accept-loop routing) and
/// reads back exactly one END-terminated chain dump, mirroring what
/// `bootstrap_chain` does against a real peer.
fn connect_peer(node: &Arc<Node>, addr: SocketAddr) -> Arc<Peer> {
    let stream = TcpStream::connect(addr).unwrap();
    Arc::new(Peer::new(
        stream,
        addr,
        node.identity.user_id,
        node.identity.username.clone(),
        addr.port(),
    ))
}

fn poll_until<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

/// Starts the listener accept loop and mining poll loop for a node, mirroring
/// `imgchain_node::startup::bootstrap_and_run` without the tracker handshake.
fn run_node(node: Arc<Node>, listener: TcpListener) {
    let accept_node = node.clone();
    thread::spawn(move || imgchain_node::listener::run_accept_loop(accept_node, listener));
    thread::spawn(move || imgchain_node::mining::run_mining_poll_loop(node));
}

/// Connects two already-running nodes to each other directly (bypassing the
/// tracker), the way `handle_connection`'s connect-back would after a hello.
fn link(a: &Arc<Node>, a_addr: SocketAddr, b: &Arc<Node>, b_addr: SocketAddr) {
    let peer_for_a = dial_and_insert(a, a_addr, b_addr);
    let peer_for_b = dial_and_insert(b, b_addr, a_addr);
    let _ = (peer_for_a, peer_for_b);
}

fn dial_and_insert(node: &Arc<Node>, own_addr: SocketAddr, target: SocketAddr) -> Arc<Peer> {
    use std::io::{Read, Write};
    let mut stream = TcpStream::connect(target).unwrap();
    let mut hello = Vec::with_capacity(66);
    hello.extend_from_slice(node.identity.user_id.as_bytes());
    let mut username = [0u8; 32];
    let bytes = node.identity.username.as_bytes();
    username[..bytes.len().min(32)].copy_from_slice(&bytes[..bytes.len().min(32)]);
    hello.extend_from_slice(&username);
    hello.extend_from_slice(&own_addr.port().to_be_bytes());
    stream.write_all(&hello).unwrap();
    let mut ack = [0u8; 3];
    stream.read_exact(&mut ack).unwrap();
    assert_eq!(&ack, &Tag::AllOk.as_bytes());

    let peer = Arc::new(Peer::new(
        stream,
        target,
        node.identity.user_id,
        node.identity.username.clone(),
        target.port(),
    ));
    node.lock_state().peers.insert((target.ip(), target.port()), peer.clone());
    peer
}

#[test]
fn bootstrap_consensus_adopts_the_agreeing_peers_dump() {
    let node = spin_node("host");
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    run_node(node.clone(), listener);

    // give the accept loop a moment to come up
    thread::sleep(Duration::from_millis(50));

    let peer_a = connect_peer(&node, addr);
    let peer_b = connect_peer(&node, addr);
    let chain = bootstrap_chain(&[peer_a, peer_b], &fast_config()).unwrap();

    assert_eq!(chain.tip_hash(), node.lock_state().chain.tip_hash());
}

#[test]
fn mint_and_transfer_propagate_between_two_nodes() {
    let n1 = spin_node("alice");
    let n2 = spin_node("bob");

    let l1 = TcpListener::bind("127.0.0.1:0").unwrap();
    let l2 = TcpListener::bind("127.0.0.1:0").unwrap();
    let a1 = l1.local_addr().unwrap();
    let a2 = l2.local_addr().unwrap();

    run_node(n1.clone(), l1);
    run_node(n2.clone(), l2);
    thread::sleep(Duration::from_millis(50));

    link(&n1, a1, &n2, a2);

    let image_id = match n1.create_nft(b"hello".to_vec()) {
        MintOutcome::Minted(id) => id,
        MintOutcome::AlreadyOwned { .. } => panic!("fresh image should not already be owned"),
    };

    let minted = poll_until(Duration::from_secs(5), || {
        n2.lock_state().chain.find_owner(&image_id) == Some(n1.identity.user_id)
    });
    assert!(minted, "n2 never learned about n1's mint");

    let fetched = n2.get_image(&image_id);
    assert_eq!(fetched, Some(b"hello".to_vec()));

    match n1.transfer_nft(image_id, n2.identity.user_id) {
        TransferOutcome::Transferred => {}
        TransferOutcome::NotOwner(owner) => panic!("expected n1 to own the image, found {owner:?}"),
    }

    let transferred = poll_until(Duration::from_secs(5), || {
        n1.lock_state().chain.find_owner(&image_id) == Some(n2.identity.user_id)
    });
    assert!(transferred, "ownership never settled on n2 across both nodes");
}

#[test]
fn duplicate_mint_is_refused_without_mutating_the_chain() {
    let node = spin_node("solo");
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    run_node(node.clone(), listener);
    thread::sleep(Duration::from_millis(20));

    let first = node.create_nft(b"same bytes".to_vec());
    let image_id = match first {
        MintOutcome::Minted(id) => id,
        MintOutcome::AlreadyOwned { .. } => panic!("first mint should succeed"),
    };

    poll_until(Duration::from_secs(5), || node.lock_state().chain.len() > 1);
    let len_after_first = node.lock_state().chain.len();

    match node.create_nft(b"same bytes".to_vec()) {
        MintOutcome::AlreadyOwned { image_id: dup_id, owner } => {
            assert_eq!(dup_id, image_id);
            assert_eq!(owner, node.identity.user_id);
        }
        MintOutcome::Minted(_) => panic!("identical bytes should be refused"),
    }

    thread::sleep(Duration::from_millis(200));
    assert_eq!(node.lock_state().chain.len(), len_after_first);
}

#[test]
fn images_lists_every_known_image_with_its_current_owner_while_me_lists_the_callers_own_images() {
    let n1 = spin_node("alice");
    let n2 = spin_node("bob");

    let l1 = TcpListener::bind("127.0.0.1:0").unwrap();
    let l2 = TcpListener::bind("127.0.0.1:0").unwrap();
    let a1 = l1.local_addr().unwrap();
    let a2 = l2.local_addr().unwrap();

    run_node(n1.clone(), l1);
    run_node(n2.clone(), l2);
    thread::sleep(Duration::from_millis(50));

    link(&n1, a1, &n2, a2);

    let kept = match n1.create_nft(b"kept by alice".to_vec()) {
        MintOutcome::Minted(id) => id,
        MintOutcome::AlreadyOwned { .. } => panic!("fresh image should not already be owned"),
    };
    poll_until(Duration::from_secs(5), || n1.lock_state().chain.len() > 1);

    let given_away = match n1.create_nft(b"given away by alice".to_vec()) {
        MintOutcome::Minted(id) => id,
        MintOutcome::AlreadyOwned { .. } => panic!("fresh image should not already be owned"),
    };
    let settled = poll_until(Duration::from_secs(5), || {
        n2.lock_state().chain.find_owner(&given_away) == Some(n1.identity.user_id)
    });
    assert!(settled, "n2 never learned about n1's second mint");

    match n1.transfer_nft(given_away, n2.identity.user_id) {
        TransferOutcome::Transferred => {}
        TransferOutcome::NotOwner(owner) => panic!("expected n1 to own the image, found {owner:?}"),
    }
    let transferred = poll_until(Duration::from_secs(5), || {
        n1.lock_state().chain.find_owner(&given_away) == Some(n2.identity.user_id)
    });
    assert!(transferred, "ownership never settled on n1 across both nodes");

    // `images`: every minted image, each with its *current* owner.
    let state = n1.lock_state();
    let all = state.chain.all_images();
    assert_eq!(all.len(), 2);
    assert_eq!(state.chain.find_owner(&kept), Some(n1.identity.user_id));
    assert_eq!(state.chain.find_owner(&given_away), Some(n2.identity.user_id));
    drop(state);

    // `me`: the caller's own receipts (naive scan, see `find_images_of` docs).
    let alice_received = n1.lock_state().chain.find_images_of(&n1.identity.user_id);
    assert!(alice_received.contains(&kept));

    let bob_received = n1.lock_state().chain.find_images_of(&n2.identity.user_id);
    assert!(bob_received.contains(&given_away));
}

#[test]
fn an_observer_node_adopts_whichever_competing_block_arrives_first_then_the_earlier_one() {
    let genesis = mine_blocking(BlockHash::zero(), Vec::new(), 0);
    let observer = spin_node("observer");
    observer.lock_state().chain = Chain::with_genesis(genesis.clone(), 0);
    observer.lock_state().reset_candidate();

    let a = mine_blocking(genesis.hash.unwrap(), Vec::new(), 0);
    assert!(observer.receive_block(a.clone()));
    assert_eq!(observer.lock_state().chain.tip_hash(), a.hash.unwrap());

    let mut a_prime = a.clone();
    a_prime.timestamp_ns = a.timestamp_ns.saturating_sub(1);
    a_prime.hash = Some(a_prime.compute_hash());
    assert!(observer.receive_block(a_prime.clone()));
    assert_eq!(observer.lock_state().chain.tip_hash(), a_prime.hash.unwrap());
}
