//! Block model (§3, §4.2): header fields plus an ordered transaction list,
//! a Merkle root kept consistent with the transactions, and the mutable
//! mining fields `{nonce, timestamp_ns, hash}`.

use crate::error::{Error, Result};
use crate::hexid::{BlockHash, NonceId};
use crate::merkle::MerkleTree;
use crate::transaction::{self, Transaction};
use sha2::{Digest, Sha256};

/// Wire size of a block header, with or without the hash: `previous_hash[64]
/// ‖ timestamp(8) ‖ [hash[64] ‖] nonce[32] ‖ trx_count(4)`.
const MINING_HEADER_LEN: usize = 64 + 8 + 32 + 4;
const WIRE_HEADER_LEN: usize = 64 + 8 + 64 + 32 + 4;

/// A block in the chain: sealed once `hash` is `Some`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub previous_hash: BlockHash,
    pub timestamp_ns: u64,
    pub nonce: NonceId,
    pub transactions: Vec<Transaction>,
    pub merkle_root: String,
    pub hash: Option<BlockHash>,
}

impl Block {
    /// Builds a fresh, unsealed candidate block extending `previous_hash`.
    pub fn new(previous_hash: BlockHash, transactions: Vec<Transaction>) -> Self {
        let merkle_root = Self::merkle_root_of(&transactions);
        Self {
            previous_hash,
            timestamp_ns: now_ns(),
            nonce: NonceId::zero(),
            transactions,
            merkle_root,
            hash: None,
        }
    }

    /// The genesis block template: empty transactions, all-zero previous hash.
    pub fn genesis_template() -> Self {
        Self::new(BlockHash::zero(), Vec::new())
    }

    /// `true` once a mining trial has sealed this block's hash.
    pub fn is_sealed(&self) -> bool {
        self.hash.is_some()
    }

    /// Appends a transaction and recomputes the Merkle root, leaving the
    /// block unsealed. Callers mining this block are responsible for
    /// stopping and restarting the miner around this mutation (§4.6).
    pub fn add_transaction(&mut self, tx: Transaction) {
        self.transactions.push(tx);
        self.merkle_root = Self::merkle_root_of(&self.transactions);
        self.hash = None;
    }

    fn merkle_root_of(transactions: &[Transaction]) -> String {
        let hashes: Vec<String> = transactions.iter().map(Transaction::hash).collect();
        MerkleTree::new(&hashes).root()
    }

    /// Fixes this block's mutable fields to a trial that met difficulty.
    pub fn seal(&mut self, nonce: NonceId, timestamp_ns: u64, hash: BlockHash) {
        self.nonce = nonce;
        self.timestamp_ns = timestamp_ns;
        self.hash = Some(hash);
    }

    /// The 108-byte mining input header (no hash field) for a given
    /// `(previous_hash, timestamp_ns, nonce, trx_count)` trial.
    pub fn mining_header_bytes(
        previous_hash: &BlockHash,
        timestamp_ns: u64,
        nonce: &NonceId,
        trx_count: u32,
    ) -> [u8; MINING_HEADER_LEN] {
        let mut out = [0u8; MINING_HEADER_LEN];
        out[0..64].copy_from_slice(previous_hash.as_bytes());
        out[64..72].copy_from_slice(&timestamp_ns.to_be_bytes());
        out[72..104].copy_from_slice(nonce.as_bytes());
        out[104..108].copy_from_slice(&trx_count.to_be_bytes());
        out
    }

    /// Encodes this block's transactions in order (no length prefix; the
    /// header's `trx_count` tells the reader how many 136-byte records follow).
    pub fn encode_transactions(transactions: &[Transaction]) -> Vec<u8> {
        let mut out = Vec::with_capacity(transactions.len() * transaction::ENCODED_LEN);
        for tx in transactions {
            out.extend_from_slice(&tx.encode());
        }
        out
    }

    /// Recomputes the block's hash from its current fields, independent of
    /// whatever `self.hash` currently holds. Used both to mine and to verify.
    pub fn compute_hash(&self) -> BlockHash {
        let header = Self::mining_header_bytes(
            &self.previous_hash,
            self.timestamp_ns,
            &self.nonce,
            self.transactions.len() as u32,
        );
        let tx_bytes = Self::encode_transactions(&self.transactions);
        let mut hasher = Sha256::new();
        hasher.update(header);
        hasher.update(tx_bytes);
        BlockHash::from_digest(&hasher.finalize())
    }

    /// Encodes the sealed block into its wire form (header-with-hash plus
    /// transactions). Fails if the block has not been sealed.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let hash = self.hash.ok_or(Error::UnsealedBlock)?;
        let mut out = Vec::with_capacity(WIRE_HEADER_LEN + self.transactions.len() * transaction::ENCODED_LEN);
        out.extend_from_slice(self.previous_hash.as_bytes());
        out.extend_from_slice(&self.timestamp_ns.to_be_bytes());
        out.extend_from_slice(hash.as_bytes());
        out.extend_from_slice(self.nonce.as_bytes());
        out.extend_from_slice(&(self.transactions.len() as u32).to_be_bytes());
        out.extend_from_slice(&Self::encode_transactions(&self.transactions));
        Ok(out)
    }

    /// Reads the `trx_count` field out of a wire header buffer without
    /// decoding the rest, so a reader can compute how many more bytes to pull.
    pub fn trx_count_from_header(header: &[u8]) -> Result<u32> {
        if header.len() < WIRE_HEADER_LEN {
            return Err(Error::BufferTooShort {
                need: WIRE_HEADER_LEN,
                have: header.len(),
            });
        }
        Ok(u32::from_be_bytes(header[168..172].try_into().unwrap()))
    }

    /// Decodes a full wire-form block (header + `trx_count` transactions).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < WIRE_HEADER_LEN {
            return Err(Error::BufferTooShort {
                need: WIRE_HEADER_LEN,
                have: bytes.len(),
            });
        }
        let previous_hash = BlockHash::from_wire(&bytes[0..64])?;
        let timestamp_ns = u64::from_be_bytes(bytes[64..72].try_into().unwrap());
        let hash = BlockHash::from_wire(&bytes[72..136])?;
        let nonce = NonceId::from_wire(&bytes[136..168])?;
        let trx_count = u32::from_be_bytes(bytes[168..172].try_into().unwrap()) as usize;

        let need = WIRE_HEADER_LEN + trx_count * transaction::ENCODED_LEN;
        if bytes.len() < need {
            return Err(Error::BufferTooShort {
                need,
                have: bytes.len(),
            });
        }
        let mut transactions = Vec::with_capacity(trx_count);
        for i in 0..trx_count {
            let start = WIRE_HEADER_LEN + i * transaction::ENCODED_LEN;
            let end = start + transaction::ENCODED_LEN;
            transactions.push(Transaction::decode(&bytes[start..end])?);
        }

        let merkle_root = Self::merkle_root_of(&transactions);
        Ok(Self {
            previous_hash,
            timestamp_ns,
            nonce,
            transactions,
            merkle_root,
            hash: Some(hash),
        })
    }
}

fn now_ns() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hexid::{ImageId, UserId};
    use crate::miner::mine_blocking;

    #[test]
    fn mined_block_round_trips_through_wire_encoding() {
        let tx = Transaction::new(UserId::random(), UserId::random(), ImageId::random());
        let block = mine_blocking(BlockHash::zero(), vec![tx], 0);
        let encoded = block.encode().unwrap();
        let decoded = Block::decode(&encoded).unwrap();
        assert_eq!(decoded.hash, block.hash);
        assert_eq!(decoded.previous_hash, block.previous_hash);
        assert_eq!(decoded.transactions, block.transactions);
    }

    #[test]
    fn add_transaction_updates_merkle_root_and_unseals() {
        let mut block = Block::genesis_template();
        let root_before = block.merkle_root.clone();
        block.hash = Some(BlockHash::zero());
        block.add_transaction(Transaction::new(
            UserId::random(),
            UserId::random(),
            ImageId::random(),
        ));
        assert_ne!(block.merkle_root, root_before);
        assert!(!block.is_sealed());
    }

    #[test]
    fn encode_fails_when_unsealed() {
        let block = Block::genesis_template();
        assert!(matches!(block.encode(), Err(Error::UnsealedBlock)));
    }
}
