//! The chain: an ordered sequence of sealed blocks plus the current mining
//! difficulty (§3, §4.3).
//!
//! `adjust_difficulty` intentionally compares the raw nanosecond gap between
//! the first and last of the last 25 blocks against the literal constants 5
//! and 15 — the original almost certainly meant seconds, but the distilled
//! spec calls for bit-exact preservation of that comparison (§9 Open
//! Questions), so we keep it and just say so here rather than silently
//! converting units.

use crate::block::Block;
use crate::error::{Error, Result};
use crate::hexid::{BlockHash, ImageId, UserId};
use crate::pow::hash_meets_difficulty;
use std::collections::HashSet;

/// Number of trailing blocks `adjust_difficulty` inspects.
const DIFFICULTY_WINDOW: usize = 25;
/// Difficulty used to mine the genesis block — distinct from (and lower
/// than) the chain's running difficulty.
pub const GENESIS_DIFFICULTY: u32 = 3;

/// Result of attempting to add a block to the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddBlockOutcome {
    /// Extended the tip normally.
    Accepted,
    /// Replaced the previous tip in the single-step fork rule.
    ForkWin,
    /// Discarded: bad hash, bad linkage, or lost the fork tie-break.
    Rejected,
}

/// An ordered sequence of sealed blocks with a single current difficulty.
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
    difficulty: u32,
}

impl Chain {
    /// Wraps an already-mined genesis block into a fresh chain.
    pub fn with_genesis(genesis: Block, difficulty: u32) -> Self {
        debug_assert!(genesis.is_sealed());
        Self {
            blocks: vec![genesis],
            difficulty,
        }
    }

    /// Rebuilds a chain from a decoded block list and difficulty (bootstrap
    /// / dump decoding path — does not re-validate linkage, callers that
    /// receive a dump over the wire should treat it as trusted per §4.7's
    /// majority-of-two-peers consensus).
    pub fn from_parts(blocks: Vec<Block>, difficulty: u32) -> Result<Self> {
        if blocks.is_empty() {
            return Err(Error::EmptyChain);
        }
        Ok(Self { blocks, difficulty })
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Commits a new difficulty, called once a majority of peers has voted
    /// for the same proposal (§4.6).
    pub fn set_difficulty(&mut self, difficulty: u32) {
        self.difficulty = difficulty;
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The current tip (always present: a chain is never constructed empty).
    pub fn tip(&self) -> &Block {
        self.blocks.last().expect("chain always has a genesis block")
    }

    pub fn tip_hash(&self) -> BlockHash {
        self.tip().hash.expect("tip is always sealed")
    }

    /// Validates and attempts to add `block` per the acceptance rule in
    /// §4.3: bad self-hash is always rejected; otherwise either single-step
    /// fork resolution (if `block` is an alternative to the current tip) or
    /// normal extension applies.
    pub fn add_block(&mut self, block: Block) -> AddBlockOutcome {
        let Some(declared_hash) = block.hash else {
            return AddBlockOutcome::Rejected;
        };
        if block.compute_hash() != declared_hash {
            return AddBlockOutcome::Rejected;
        }

        if self.blocks.len() >= 2 {
            let grandparent_hash = self.blocks[self.blocks.len() - 2].hash.unwrap();
            if block.previous_hash == grandparent_hash {
                let tip = self.tip();
                // Earlier miner wins: keep the existing tip unless the
                // challenger has a strictly earlier timestamp (§4.3, §9).
                if tip.timestamp_ns < block.timestamp_ns {
                    return AddBlockOutcome::Rejected;
                }
                let last = self.blocks.len() - 1;
                self.blocks[last] = block;
                return AddBlockOutcome::ForkWin;
            }
        }

        if block.previous_hash == self.tip_hash() && hash_meets_difficulty(declared_hash.as_str(), self.difficulty) {
            self.blocks.push(block);
            return AddBlockOutcome::Accepted;
        }

        AddBlockOutcome::Rejected
    }

    /// Inspects the last 25 blocks and proposes a difficulty change. Does
    /// not mutate `self.difficulty` — the orchestrator commits a proposal
    /// only once a majority of peers has voted for it (§4.6).
    pub fn adjust_difficulty(&self) -> (bool, u32) {
        if self.blocks.len() < DIFFICULTY_WINDOW {
            return (false, self.difficulty);
        }
        let window = &self.blocks[self.blocks.len() - DIFFICULTY_WINDOW..];
        let span_ns = window.last().unwrap().timestamp_ns as i128 - window.first().unwrap().timestamp_ns as i128;
        let avg = span_ns / DIFFICULTY_WINDOW as i128;

        // Comparison against 5 / 15 is against the raw nanosecond average,
        // not seconds — preserved verbatim, see module docs.
        if avg < 5 {
            (true, self.difficulty + 1)
        } else if avg > 15 {
            (true, self.difficulty.saturating_sub(1))
        } else {
            (false, self.difficulty)
        }
    }

    /// Newest-first scan for the current owner of `image_id` (§4.3).
    pub fn find_owner(&self, image_id: &ImageId) -> Option<UserId> {
        for block in self.blocks.iter().rev() {
            for tx in block.transactions.iter().rev() {
                if tx.image_id == *image_id {
                    return Some(tx.receiver);
                }
            }
        }
        None
    }

    /// Forward scan returning every `image_id` ever received by `user_id`,
    /// including ones since transferred away. This is a literal port of the
    /// original's naive scan (§9 Open Question, decided): callers that want
    /// "currently owned" should call [`Chain::find_owner`] per image instead.
    pub fn find_images_of(&self, user_id: &UserId) -> Vec<ImageId> {
        let mut images = Vec::new();
        for block in &self.blocks {
            for tx in &block.transactions {
                if tx.receiver == *user_id {
                    images.push(tx.image_id);
                }
            }
        }
        images
    }

    /// Every image id ever mentioned anywhere on the chain.
    pub fn all_images(&self) -> HashSet<ImageId> {
        let mut images = HashSet::new();
        for block in &self.blocks {
            for tx in &block.transactions {
                images.insert(tx.image_id);
            }
        }
        images
    }

    /// Encodes the full chain dump: `difficulty(u16) ‖ block_count(u32) ‖ blocks…`.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.difficulty as u16).to_be_bytes());
        out.extend_from_slice(&(self.blocks.len() as u32).to_be_bytes());
        for block in &self.blocks {
            out.extend_from_slice(&block.encode()?);
        }
        Ok(out)
    }

    /// Decodes a chain dump produced by [`Chain::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 6 {
            return Err(Error::BufferTooShort { need: 6, have: bytes.len() });
        }
        let difficulty = u16::from_be_bytes(bytes[0..2].try_into().unwrap()) as u32;
        let block_count = u32::from_be_bytes(bytes[2..6].try_into().unwrap()) as usize;
        let mut cursor = 6usize;
        let mut blocks = Vec::with_capacity(block_count);
        for _ in 0..block_count {
            let header = bytes.get(cursor..).ok_or(Error::BufferTooShort {
                need: cursor,
                have: bytes.len(),
            })?;
            let trx_count = Block::trx_count_from_header(header)? as usize;
            let block_len = 172 + trx_count * crate::transaction::ENCODED_LEN;
            let slice = bytes.get(cursor..cursor + block_len).ok_or(Error::BufferTooShort {
                need: cursor + block_len,
                have: bytes.len(),
            })?;
            blocks.push(Block::decode(slice)?);
            cursor += block_len;
        }
        Chain::from_parts(blocks, difficulty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hexid::ImageId;
    use crate::miner::mine_blocking;
    use crate::transaction::Transaction;

    fn genesis_chain(difficulty: u32) -> Chain {
        let genesis = mine_blocking(BlockHash::zero(), Vec::new(), 0);
        Chain::with_genesis(genesis, difficulty)
    }

    #[test]
    fn extension_invariant_holds_after_several_blocks() {
        let mut chain = genesis_chain(0);
        for _ in 0..3 {
            let block = mine_blocking(chain.tip_hash(), Vec::new(), 0);
            assert_eq!(chain.add_block(block), AddBlockOutcome::Accepted);
        }
        for i in 1..chain.len() {
            assert_eq!(chain.blocks()[i].previous_hash, chain.blocks()[i - 1].hash.unwrap());
        }
    }

    #[test]
    fn fork_tie_break_prefers_earlier_timestamp() {
        let mut chain = genesis_chain(0);
        let genesis_hash = chain.tip_hash();
        let mut a = mine_blocking(genesis_hash, Vec::new(), 0);
        a.timestamp_ns = 1000;
        chain.add_block(a.clone());

        let mut later = mine_blocking(genesis_hash, Vec::new(), 0);
        later.timestamp_ns = 2000;
        later.hash = Some(later.compute_hash());
        assert_eq!(chain.add_block(later), AddBlockOutcome::Rejected);
        assert_eq!(chain.tip().timestamp_ns, 1000);

        let mut earlier = mine_blocking(genesis_hash, Vec::new(), 0);
        earlier.timestamp_ns = 500;
        earlier.hash = Some(earlier.compute_hash());
        assert_eq!(chain.add_block(earlier), AddBlockOutcome::ForkWin);
        assert_eq!(chain.tip().timestamp_ns, 500);
    }

    #[test]
    fn difficulty_adjustment_needs_full_window() {
        let chain = genesis_chain(4);
        assert_eq!(chain.adjust_difficulty(), (false, 4));
    }

    #[test]
    fn difficulty_increases_on_fast_blocks() {
        let mut blocks = vec![mine_blocking(BlockHash::zero(), Vec::new(), 0)];
        for i in 1..25 {
            let mut b = mine_blocking(blocks[i - 1].hash.unwrap(), Vec::new(), 0);
            b.timestamp_ns = i as u64; // 1ns apart
            b.hash = Some(b.compute_hash());
            blocks.push(b);
        }
        let chain = Chain::from_parts(blocks, 4).unwrap();
        assert_eq!(chain.adjust_difficulty(), (true, 5));
    }

    #[test]
    fn difficulty_decreases_on_slow_blocks() {
        let mut blocks = vec![mine_blocking(BlockHash::zero(), Vec::new(), 0)];
        for i in 1..25 {
            let mut b = mine_blocking(blocks[i - 1].hash.unwrap(), Vec::new(), 0);
            b.timestamp_ns = (i as u64) * 100_000_000_000; // 1e11 ns apart
            b.hash = Some(b.compute_hash());
            blocks.push(b);
        }
        let chain = Chain::from_parts(blocks, 4).unwrap();
        assert_eq!(chain.adjust_difficulty(), (true, 3));
    }

    #[test]
    fn ownership_queries_follow_latest_transaction() {
        let mut chain = genesis_chain(0);
        let (u, v) = (UserId::random(), UserId::random());
        let image = ImageId::random();

        let mint = Transaction::new(u, u, image);
        let mut b1 = Block::new(chain.tip_hash(), vec![mint]);
        let sealed = crate::miner::mine_blocking(b1.previous_hash, b1.transactions.clone(), 0);
        b1.seal(sealed.nonce, sealed.timestamp_ns, sealed.hash.unwrap());
        assert_eq!(chain.add_block(b1), AddBlockOutcome::Accepted);
        assert_eq!(chain.find_owner(&image), Some(u));

        let transfer = Transaction::new(u, v, image);
        let mut b2 = Block::new(chain.tip_hash(), vec![transfer]);
        let sealed2 = crate::miner::mine_blocking(b2.previous_hash, b2.transactions.clone(), 0);
        b2.seal(sealed2.nonce, sealed2.timestamp_ns, sealed2.hash.unwrap());
        assert_eq!(chain.add_block(b2), AddBlockOutcome::Accepted);
        assert_eq!(chain.find_owner(&image), Some(v));
    }

    #[test]
    fn chain_dump_round_trips() {
        let mut chain = genesis_chain(0);
        for _ in 0..2 {
            let block = mine_blocking(chain.tip_hash(), Vec::new(), 0);
            chain.add_block(block);
        }
        let dump = chain.encode().unwrap();
        let decoded = Chain::decode(&dump).unwrap();
        assert_eq!(decoded.encode().unwrap(), dump);
    }
}
