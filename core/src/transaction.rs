//! Transactions: the unit of ownership transfer recorded on the chain.
//!
//! A transaction where `sender == receiver` asserts origination (minting) of
//! an image by that user; any other transaction asserts a transfer. Fields
//! are immutable once constructed and the transaction's hash is a pure
//! function of them (§3, §8 testable property 1).

use crate::error::{Error, Result};
use crate::hexid::{ImageId, UserId};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wire size of an encoded transaction: `sender[32] ‖ receiver[32] ‖ image_id[64] ‖ timestamp_ns(8)`.
pub const ENCODED_LEN: usize = 32 + 32 + 64 + 8;

/// A record of an image changing hands (or being minted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub sender: UserId,
    pub receiver: UserId,
    pub image_id: ImageId,
    pub timestamp_ns: u64,
}

impl Transaction {
    /// Builds a transaction stamped with the current wall-clock time.
    pub fn new(sender: UserId, receiver: UserId, image_id: ImageId) -> Self {
        Self::with_timestamp(sender, receiver, image_id, now_ns())
    }

    /// Builds a transaction with an explicit timestamp, used when
    /// reconstructing one from the wire or in tests.
    pub fn with_timestamp(
        sender: UserId,
        receiver: UserId,
        image_id: ImageId,
        timestamp_ns: u64,
    ) -> Self {
        Self {
            sender,
            receiver,
            image_id,
            timestamp_ns,
        }
    }

    /// `true` if this transaction originates (mints) the image rather than
    /// transferring it from one owner to another.
    pub fn is_mint(&self) -> bool {
        self.sender == self.receiver
    }

    /// Encodes the transaction into its 136-byte fixed wire form.
    pub fn encode(&self) -> [u8; ENCODED_LEN] {
        let mut out = [0u8; ENCODED_LEN];
        out[0..32].copy_from_slice(self.sender.as_bytes());
        out[32..64].copy_from_slice(self.receiver.as_bytes());
        out[64..128].copy_from_slice(self.image_id.as_bytes());
        out[128..136].copy_from_slice(&self.timestamp_ns.to_be_bytes());
        out
    }

    /// Decodes a transaction from an exactly-136-byte wire buffer.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ENCODED_LEN {
            return Err(Error::BufferTooShort {
                need: ENCODED_LEN,
                have: bytes.len(),
            });
        }
        let sender = UserId::from_wire(&bytes[0..32])?;
        let receiver = UserId::from_wire(&bytes[32..64])?;
        let image_id = ImageId::from_wire(&bytes[64..128])?;
        let timestamp_ns = u64::from_be_bytes(bytes[128..136].try_into().unwrap());
        Ok(Self::with_timestamp(sender, receiver, image_id, timestamp_ns))
    }

    /// SHA-256 hex digest of the encoded transaction.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.encode());
        hex::encode(hasher.finalize())
    }
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

    fn sample() -> Transaction {
        Transaction::with_timestamp(UserId::random(), UserId::random(), ImageId::random(), 42)
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let tx = sample();
        let decoded = Transaction::decode(&tx.encode()).unwrap();
        assert_eq!(tx, decoded);
    }

    #[test]
    fn hash_is_deterministic() {
        let tx = sample();
        assert_eq!(tx.hash(), tx.hash());
    }

    #[test]
    fn mint_detected_when_sender_equals_receiver() {
        let user = UserId::random();
        let tx = Transaction::new(user, user, ImageId::random());
        assert!(tx.is_mint());
    }

    #[test]
    fn decode_rejects_short_buffer() {
        assert!(matches!(
            Transaction::decode(&[0u8; 10]),
            Err(Error::BufferTooShort { need: 136, have: 10 })
        ));
    }
}
