//! The node orchestrator (§4.6): owns the chain, the in-flight candidate,
//! the peer directory and local image storage behind one coarse lock, and
//! drives mining, block acceptance, and difficulty consensus.

use crate::error::Result;
use crate::identity::Identity;
use crate::state::NodeState;
use imgchain_core::config::Config;
use imgchain_core::miner::{spawn_miner, SealedHeader};
use imgchain_core::{AddBlockOutcome, Block, Chain, ImageId, Transaction, UserId};
use imgchain_net::conn::recv_exact;
use imgchain_net::{Peer, PeerKey, Tag};
use sha2::Digest;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Outcome of attempting to mint a new image.
#[derive(Debug, Clone)]
pub enum MintOutcome {
    Minted(ImageId),
    AlreadyOwned { image_id: ImageId, owner: UserId },
}

/// Outcome of attempting to transfer an image.
#[derive(Debug, Clone)]
pub enum TransferOutcome {
    Transferred,
    NotOwner(UserId),
}

struct MinerHandle {
    cancel: Arc<AtomicBool>,
    rx: Receiver<SealedHeader>,
}

pub struct Node {
    pub identity: Identity,
    pub config: Config,
    state: Mutex<NodeState>,
    miner: Mutex<Option<MinerHandle>>,
    pub running: AtomicBool,
}

impl Node {
    pub fn new(identity: Identity, config: Config, chain: Chain, peers: imgchain_net::PeerDirectory) -> Arc<Self> {
        let mut state = NodeState::new(chain);
        state.peers = peers;
        Arc::new(Self {
            identity,
            config,
            state: Mutex::new(state),
            miner: Mutex::new(None),
            running: AtomicBool::new(true),
        })
    }

    pub fn lock_state(&self) -> std::sync::MutexGuard<'_, NodeState> {
        self.state.lock().unwrap()
    }

    fn cancel_current_miner(&self) {
        if let Some(handle) = self.miner.lock().unwrap().take() {
            handle.cancel.store(true, Ordering::Relaxed);
        }
    }

    /// Restarts the miner over `state.candidate`'s current contents, at the
    /// chain's current difficulty. Callers must hold `state` locked only
    /// long enough to read the inputs, not across this call.
    fn restart_miner(&self, previous_hash: imgchain_core::BlockHash, transactions: Vec<Transaction>, difficulty: u32) {
        self.cancel_current_miner();
        let cancel = Arc::new(AtomicBool::new(false));
        let (_handle, rx) = spawn_miner(previous_hash, transactions, difficulty, cancel.clone());
        *self.miner.lock().unwrap() = Some(MinerHandle { cancel, rx });
    }

    /// Drains the miner's completion channel without blocking; called from
    /// the mining-poll loop (§5).
    pub fn try_take_sealed(&self) -> Option<SealedHeader> {
        let guard = self.miner.lock().unwrap();
        guard.as_ref().and_then(|h| h.rx.try_recv().ok())
    }

    /// Adds a transaction to the in-flight candidate and (re)starts mining
    /// it, broadcasting to peers if `own` (this node originated it).
    pub fn add_transaction(self: &Arc<Self>, tx: Transaction, own: bool) -> Result<()> {
        let (previous_hash, transactions, difficulty) = {
            let mut state = self.lock_state();
            let was_mining = !state.candidate.transactions.is_empty();
            if was_mining {
                drop(state);
                self.cancel_current_miner();
                state = self.lock_state();
            }
            state.candidate.add_transaction(tx.clone());
            (
                state.candidate.previous_hash,
                state.candidate.transactions.clone(),
                state.chain.difficulty(),
            )
        };
        self.restart_miner(previous_hash, transactions, difficulty);

        if own {
            self.broadcast(Tag::NewTransaction, &tx.encode());
        }
        Ok(())
    }

    /// Mints a new image if nobody already owns an identical one.
    pub fn create_nft(self: &Arc<Self>, image_bytes: Vec<u8>) -> MintOutcome {
        let (image_id, already_owned) = {
            let mut state = self.lock_state();
            let image_id = ImageId::from_digest(&sha2::Sha256::digest(&image_bytes));
            if let Some(owner) = owner_if_present(&state.chain, &image_id) {
                (image_id, Some(owner))
            } else {
                state.store.put_with_id(image_id, image_bytes.clone());
                (image_id, None)
            }
        };

        if let Some(owner) = already_owned {
            return MintOutcome::AlreadyOwned { image_id, owner };
        }

        self.broadcast_image(image_id, &image_bytes);
        let tx = Transaction::new(self.identity.user_id, self.identity.user_id, image_id);
        let _ = self.add_transaction(tx, true);
        MintOutcome::Minted(image_id)
    }

    /// Transfers ownership of `image_id` to `recipient`, refusing if this
    /// node is not the current owner.
    pub fn transfer_nft(self: &Arc<Self>, image_id: ImageId, recipient: UserId) -> TransferOutcome {
        let owner = self.lock_state().chain.find_owner(&image_id);
        match owner {
            Some(owner) if owner == self.identity.user_id => {
                let tx = Transaction::new(self.identity.user_id, recipient, image_id);
                let _ = self.add_transaction(tx, true);
                TransferOutcome::Transferred
            }
            Some(owner) => TransferOutcome::NotOwner(owner),
            None => TransferOutcome::NotOwner(UserId::zero()),
        }
    }

    /// Fetches image bytes: local storage first, then each peer in turn.
    pub fn get_image(&self, image_id: &ImageId) -> Option<Vec<u8>> {
        if let Some(bytes) = self.lock_state().store.get(image_id) {
            return Some(bytes.to_vec());
        }

        let peers: Vec<Arc<Peer>> = self.lock_state().peers.values().cloned().collect();
        for peer in peers {
            if let Ok(Some(bytes)) = request_image_from_peer(&peer, image_id) {
                self.lock_state().store.put_with_id(*image_id, bytes.clone());
                return Some(bytes);
            }
        }
        None
    }

    fn broadcast_image(&self, image_id: ImageId, bytes: &[u8]) {
        let mut payload = Vec::with_capacity(ImageId::LEN + bytes.len());
        payload.extend_from_slice(image_id.as_bytes());
        payload.extend_from_slice(bytes);
        self.broadcast(Tag::NewImage, &payload);
    }

    /// Sends `tag ‖ payload` to every known peer, dropping any peer whose
    /// connection has failed.
    pub fn broadcast(&self, tag: Tag, payload: &[u8]) {
        let peers: Vec<(PeerKey, Arc<Peer>)> = {
            let state = self.lock_state();
            state
                .peers
                .keys()
                .copied()
                .zip(state.peers.values().cloned())
                .collect()
        };
        for (key, peer) in peers {
            if peer.send_framed(tag, payload).is_err() {
                warn!(?key, "dropping peer after failed send");
                self.lock_state().peers.remove(&key);
            }
        }
    }

    /// Broadcasts a sealed block and tallies peer acknowledgements.
    /// Returns `true` if a majority of peers rejected it, meaning the
    /// caller (the mining-poll loop) should re-run bootstrap (§4.6).
    pub fn send_block(self: &Arc<Self>, block: &Block) -> Result<bool> {
        let peers: Vec<(PeerKey, Arc<Peer>)> = {
            let state = self.lock_state();
            state
                .peers
                .keys()
                .copied()
                .zip(state.peers.values().cloned())
                .collect()
        };
        let encoded = block.encode()?;
        let mut success = 0usize;
        let mut failure = 0usize;
        for (key, peer) in &peers {
            match peer.send_framed(Tag::NewBlock, &encoded) {
                Ok(()) => {
                    let mut reader = peer.try_clone_stream()?;
                    match recv_exact(&mut reader, Tag::LEN) {
                        Ok(ack) if ack == Tag::AllOk.as_bytes() => success += 1,
                        _ => failure += 1,
                    }
                }
                Err(_) => {
                    warn!(?key, "dropping peer after failed block send");
                    self.lock_state().peers.remove(key);
                    failure += 1;
                }
            }
        }
        if success < failure {
            info!("majority of peers rejected our block, signalling re-bootstrap");
            return Ok(true);
        }
        Ok(false)
    }

    /// Applies a block received from a peer; on acceptance, cancels and
    /// restarts the candidate and re-evaluates difficulty.
    pub fn receive_block(self: &Arc<Self>, block: Block) -> bool {
        let outcome = {
            let mut state = self.lock_state();
            state.chain.add_block(block)
        };
        match outcome {
            AddBlockOutcome::Accepted | AddBlockOutcome::ForkWin => {
                self.cancel_current_miner();
                self.lock_state().reset_candidate();
                self.update_difficulty(None);
                true
            }
            AddBlockOutcome::Rejected => false,
        }
    }

    /// Proposes (and broadcasts) a difficulty change when `explicit` is
    /// `None`, or tallies a peer's vote for `explicit` otherwise;
    /// difficulty actually changes once a strict majority agrees (§4.6).
    pub fn update_difficulty(&self, explicit: Option<u32>) {
        let difficulty = match explicit {
            Some(d) => d,
            None => {
                let (changed, proposed) = self.lock_state().chain.adjust_difficulty();
                if !changed {
                    return;
                }
                self.broadcast(Tag::NewDifficulty, &(proposed as u16).to_be_bytes());
                proposed
            }
        };

        let mut state = self.lock_state();
        let votes = state.diff_votes.entry(difficulty).or_insert(0);
        *votes += 1;
        let votes = *votes;
        let peer_count = state.peers.len();
        if votes > peer_count / 2 {
            debug!(difficulty, "difficulty change reached majority");
            state.chain.set_difficulty(difficulty);
            state.diff_votes.clear();
        }
    }
}

fn owner_if_present(chain: &Chain, image_id: &ImageId) -> Option<UserId> {
    if chain.all_images().contains(image_id) {
        chain.find_owner(image_id)
    } else {
        None
    }
}

fn request_image_from_peer(peer: &Peer, image_id: &ImageId) -> Result<Option<Vec<u8>>> {
    peer.send_framed(Tag::GetImage, image_id.as_bytes())?;
    let mut reader = peer.try_clone_stream()?;
    let head = recv_exact(&mut reader, Tag::LEN)?;
    if head == Tag::Failure.as_bytes() {
        return Ok(None);
    }
    let mut rest = imgchain_net::conn::recv_until_end(&mut reader)?;
    let mut bytes = head;
    bytes.append(&mut rest);
    Ok(Some(bytes))
}
