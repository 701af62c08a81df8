//! Cancellable proof-of-work mining (§4.2, §9).
//!
//! Rather than handing the mining thread a mutable reference into its parent
//! block, `spawn_miner` takes the inputs it needs by value (previous hash,
//! transaction snapshot, difficulty) plus a shared cancellation flag, and
//! reports a sealed trial back through a channel. The caller (the node's
//! mining-poll loop) applies [`Block::seal`] to its own owned candidate —
//! this is the "task + cancellation token + completion signal" shape called
//! for instead of a raw polled mutable flag.

use crate::block::Block;
use crate::hexid::{BlockHash, NonceId};
use crate::pow::hash_meets_difficulty;
use crate::transaction::Transaction;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A successful mining trial: the header fields that made `hash` valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealedHeader {
    pub nonce: NonceId,
    pub timestamp_ns: u64,
    pub hash: BlockHash,
}

/// How long a trial sleeps before retrying when it misses difficulty.
const TRIAL_SLEEP: Duration = Duration::from_micros(10);

/// Starts a background thread searching for a nonce/timestamp pair whose
/// block hash meets `difficulty`. Returns the thread handle and a channel
/// that receives exactly one [`SealedHeader`] if the search succeeds before
/// being cancelled via `cancel`.
pub fn spawn_miner(
    previous_hash: BlockHash,
    transactions: Vec<Transaction>,
    difficulty: u32,
    cancel: Arc<AtomicBool>,
) -> (JoinHandle<()>, Receiver<SealedHeader>) {
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let tx_bytes = Block::encode_transactions(&transactions);
        let trx_count = transactions.len() as u32;
        loop {
            if cancel.load(Ordering::Relaxed) {
                return;
            }
            let nonce = NonceId::random();
            let timestamp_ns = now_ns();
            let header = Block::mining_header_bytes(&previous_hash, timestamp_ns, &nonce, trx_count);
            let mut hasher = Sha256::new();
            hasher.update(header);
            hasher.update(&tx_bytes);
            let hash = BlockHash::from_digest(&hasher.finalize());

            if hash_meets_difficulty(hash.as_str(), difficulty) {
                let _ = tx.send(SealedHeader {
                    nonce,
                    timestamp_ns,
                    hash,
                });
                return;
            }
            thread::sleep(TRIAL_SLEEP);
        }
    });
    (handle, rx)
}

/// Mines a block synchronously on the calling thread: used for the genesis
/// block and in tests, where there is no candidate to cancel or restart.
pub fn mine_blocking(previous_hash: BlockHash, transactions: Vec<Transaction>, difficulty: u32) -> Block {
    let cancel = Arc::new(AtomicBool::new(false));
    let mut block = Block::new(previous_hash, transactions.clone());
    let (handle, rx) = spawn_miner(previous_hash, transactions, difficulty, cancel);
    let sealed = rx.recv().expect("mining thread exited without sealing");
    block.seal(sealed.nonce, sealed.timestamp_ns, sealed.hash);
    handle.join().expect("mining thread panicked");
    block
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hexid::{ImageId, UserId};

    #[test]
    fn difficulty_zero_seals_immediately() {
        let block = mine_blocking(BlockHash::zero(), Vec::new(), 0);
        assert!(block.is_sealed());
        assert_eq!(block.hash.unwrap(), block.compute_hash());
    }

    #[test]
    fn sealed_hash_meets_difficulty_and_matches_recompute() {
        let tx = Transaction::new(UserId::random(), UserId::random(), ImageId::random());
        let block = mine_blocking(BlockHash::zero(), vec![tx], 8);
        assert!(hash_meets_difficulty(block.hash.unwrap().as_str(), 8));
        assert_eq!(block.hash.unwrap(), block.compute_hash());
    }

    #[test]
    fn cancellation_stops_the_search_within_a_trial() {
        let cancel = Arc::new(AtomicBool::new(false));
        let (handle, rx) = spawn_miner(BlockHash::zero(), Vec::new(), 64, cancel.clone());
        cancel.store(true, Ordering::Relaxed);
        handle.join().unwrap();
        assert!(rx.try_recv().is_err());
    }
}
