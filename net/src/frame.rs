//! Frame tags: the 3-byte ASCII message headers every peer connection speaks
//! (§4.5, §6). Each tag is followed by either a fixed-size payload or a
//! variable-size one terminated by the literal `END` sentinel.

use crate::error::{Error, Result};

/// A 3-byte ASCII message tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Request the sender's full chain dump.
    BlockchainRequested,
    /// A newly mined or forwarded block follows, `END`-terminated.
    NewBlock,
    /// A new transaction follows, `END`-terminated.
    NewTransaction,
    /// A 2-byte big-endian difficulty proposal follows (no `END`).
    NewDifficulty,
    /// A 64-byte image id followed by image bytes, `END`-terminated.
    NewImage,
    /// A 64-byte image id follows (no `END`); reply is `FLR` or image bytes + `END`.
    GetImage,
    /// Acknowledges success (no payload).
    AllOk,
    /// Acknowledges failure (no payload).
    Failure,
}

/// The sentinel bytes every variable-length payload is terminated with.
pub const END: [u8; 3] = *b"END";

impl Tag {
    pub const LEN: usize = 3;

    pub fn as_bytes(self) -> [u8; 3] {
        match self {
            Tag::BlockchainRequested => *b"SBC",
            Tag::NewBlock => *b"NBL",
            Tag::NewTransaction => *b"NTR",
            Tag::NewDifficulty => *b"NDF",
            Tag::NewImage => *b"SIM",
            Tag::GetImage => *b"GIM",
            Tag::AllOk => *b"AOK",
            Tag::Failure => *b"FLR",
        }
    }

    pub fn parse(bytes: [u8; 3]) -> Result<Self> {
        Ok(match &bytes {
            b"SBC" => Tag::BlockchainRequested,
            b"NBL" => Tag::NewBlock,
            b"NTR" => Tag::NewTransaction,
            b"NDF" => Tag::NewDifficulty,
            b"SIM" => Tag::NewImage,
            b"GIM" => Tag::GetImage,
            b"AOK" => Tag::AllOk,
            b"FLR" => Tag::Failure,
            _ => return Err(Error::UnknownTag(bytes)),
        })
    }

    /// `true` for tags whose payload is scanned for the `END` sentinel
    /// rather than read as a fixed number of bytes.
    pub fn is_end_terminated(self) -> bool {
        matches!(self, Tag::NewBlock | Tag::NewTransaction | Tag::NewImage)
    }
}
