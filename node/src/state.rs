//! Everything the orchestrator guards behind its one coarse lock (§3, §5):
//! the chain, the in-flight candidate block, the peer directory, local
//! image storage, and the running tally of difficulty votes.

use imgchain_core::{Block, Chain, ContentStore};
use imgchain_net::PeerDirectory;
use std::collections::HashMap;

pub struct NodeState {
    pub chain: Chain,
    pub candidate: Block,
    pub peers: PeerDirectory,
    pub store: ContentStore,
    /// difficulty -> number of peers who have voted for it since the last commit.
    pub diff_votes: HashMap<u32, usize>,
}

impl NodeState {
    pub fn new(chain: Chain) -> Self {
        let candidate = Block::new(chain.tip_hash(), Vec::new());
        Self {
            chain,
            candidate,
            peers: PeerDirectory::new(),
            store: ContentStore::new(),
            diff_votes: HashMap::new(),
        }
    }

    /// Replaces the candidate with a fresh, empty one extending the current tip.
    pub fn reset_candidate(&mut self) {
        self.candidate = Block::new(self.chain.tip_hash(), Vec::new());
    }
}
