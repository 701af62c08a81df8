//! Merkle accumulator over a block's transaction hashes (§3, §4.1).
//!
//! Layer 0 is the list of transaction hashes in insertion order. Each next
//! layer pairs adjacent elements — duplicating the last one if the count is
//! odd — and hashes the ASCII concatenation of the two lowercase hex strings
//! with SHA-256. An empty transaction list roots to `SHA-256("")`.

use sha2::{Digest, Sha256};

/// Accumulates transaction hashes and rebuilds the Merkle root on demand.
///
/// `append` is not incremental (it rebuilds from layer 0) but is guaranteed
/// to produce the same root as constructing fresh from `leaves ++ [hash]`.
#[derive(Debug, Clone, Default)]
pub struct MerkleTree {
    leaves: Vec<String>,
}

impl MerkleTree {
    /// Builds a tree over an ordered list of transaction hash hex strings.
    pub fn new(tx_hashes: &[String]) -> Self {
        Self {
            leaves: tx_hashes.to_vec(),
        }
    }

    /// Appends a transaction hash and leaves the tree ready to recompute its
    /// root; equivalent to discarding `self` and calling
    /// `MerkleTree::new(leaves ++ [hash])`.
    pub fn append(&mut self, hash: String) {
        self.leaves.push(hash);
    }

    /// Returns the root hash. An empty accumulator roots to `SHA-256("")`.
    pub fn root(&self) -> String {
        if self.leaves.is_empty() {
            return hex::encode(Sha256::digest(b""));
        }
        let mut layer = self.leaves.clone();
        while layer.len() > 1 {
            if layer.len() % 2 != 0 {
                layer.push(layer.last().unwrap().clone());
            }
            layer = layer
                .chunks(2)
                .map(|pair| {
                    let mut hasher = Sha256::new();
                    hasher.update(pair[0].as_bytes());
                    hasher.update(pair[1].as_bytes());
                    hex::encode(hasher.finalize())
                })
                .collect();
        }
        layer.into_iter().next().unwrap()
    }

    /// The leaves this tree was built from (layer 0).
    pub fn leaves(&self) -> &[String] {
        &self.leaves
    }
}
