//! Fixed-width hex identifiers used throughout the wire protocol.
//!
//! User ids, image ids, block hashes and nonces are all ASCII hex strings of
//! a fixed width (32 or 64 characters). Modelling them as a single
//! `HexId<N>` newtype over `[u8; N]` means a malformed width is rejected at
//! the parse boundary rather than surfacing as a panic deep in wire decoding.

use crate::error::{Error, Result};
use rand::RngCore;
use std::fmt;
use std::str::FromStr;

/// An ASCII-lowercase hex string of exactly `N` characters, stored as its raw
/// wire bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HexId<const N: usize>([u8; N]);

impl<const N: usize> HexId<N> {
    /// Number of ASCII characters this id occupies on the wire.
    pub const LEN: usize = N;

    /// The all-zero id, used for the genesis block's `previous_hash`.
    pub fn zero() -> Self {
        Self([b'0'; N])
    }

    /// Generates a fresh random id: `N / 2` random bytes hex-encoded to `N`
    /// ASCII characters. Used for user ids and mining nonces — a fresh
    /// random value per trial, never an incrementing counter.
    pub fn random() -> Self {
        let mut raw = vec![0u8; N / 2];
        rand::thread_rng().fill_bytes(&mut raw);
        Self::from_digest(&raw)
    }

    /// Hex-encodes a `N / 2`-byte digest (e.g. a SHA-256 output) into an id.
    pub fn from_digest(digest: &[u8]) -> Self {
        debug_assert_eq!(digest.len() * 2, N, "digest width does not match HexId<N>");
        let encoded = hex::encode(digest);
        let mut out = [0u8; N];
        out.copy_from_slice(encoded.as_bytes());
        Self(out)
    }

    /// Parses a hex string, requiring exactly `N` hex-digit characters.
    pub fn parse(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != N {
            return Err(Error::InvalidHexLength {
                expected: N,
                got: bytes.len(),
            });
        }
        let mut out = [0u8; N];
        for (i, &b) in bytes.iter().enumerate() {
            if !b.is_ascii_hexdigit() {
                return Err(Error::InvalidHexChar(b as char));
            }
            out[i] = b.to_ascii_lowercase();
        }
        Ok(Self(out))
    }

    /// Parses an id directly out of a wire buffer slice of exactly `N` bytes.
    pub fn from_wire(bytes: &[u8]) -> Result<Self> {
        let s = std::str::from_utf8(bytes).map_err(|_| Error::InvalidHexLength {
            expected: N,
            got: bytes.len(),
        })?;
        Self::parse(s)
    }

    /// Borrow the id as its ASCII wire bytes.
    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    /// Borrow the id as a `&str` (always valid lowercase hex ASCII).
    pub fn as_str(&self) -> &str {
        // Safety net: every constructor above only ever writes ASCII hex digits.
        std::str::from_utf8(&self.0).expect("HexId always holds ASCII hex")
    }
}

impl<const N: usize> fmt::Display for HexId<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const N: usize> fmt::Debug for HexId<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HexId<{}>({})", N, self.as_str())
    }
}

impl<const N: usize> FromStr for HexId<N> {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A 32-hex-character user id.
pub type UserId = HexId<32>;
/// A 64-hex-character image id / content hash / block hash (SHA-256 hex digest).
pub type ImageId = HexId<64>;
/// A 64-hex-character block hash. Distinct alias of the same width as [`ImageId`].
pub type BlockHash = HexId<64>;
/// A 32-hex-character mining nonce.
pub type NonceId = HexId<32>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_has_correct_width() {
        assert_eq!(UserId::zero().as_str(), "0".repeat(32));
        assert_eq!(BlockHash::zero().as_str(), "0".repeat(64));
    }

    #[test]
    fn random_round_trips_through_parse() {
        let id = UserId::random();
        let reparsed = UserId::parse(id.as_str()).unwrap();
        assert_eq!(id, reparsed);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        let err = UserId::parse("abc").unwrap_err();
        assert_eq!(
            err,
            Error::InvalidHexLength {
                expected: 32,
                got: 3
            }
        );
    }

    #[test]
    fn parse_rejects_non_hex() {
        let bad = "g".repeat(32);
        assert!(matches!(
            UserId::parse(&bad),
            Err(Error::InvalidHexChar('g'))
        ));
    }

    #[test]
    fn parse_lowercases_input() {
        let upper = "AB".repeat(16);
        let id = UserId::parse(&upper).unwrap();
        assert_eq!(id.as_str(), upper.to_lowercase());
    }
}
