//! Content-addressed storage for image bytes (§4.4).
//!
//! Images are kept off-chain: the chain only ever records an [`ImageId`]
//! (the SHA-256 hex digest of the content), never the bytes themselves. A
//! node's [`ContentStore`] is the local cache a client consults before
//! asking a peer for the content behind an id.

use crate::hexid::ImageId;
use sha2::Digest;
use std::collections::HashMap;

/// An in-memory map from image id to its raw bytes.
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    images: HashMap<ImageId, Vec<u8>>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes `image_id` from `bytes` via SHA-256 and stores them under it.
    pub fn put(&mut self, bytes: Vec<u8>) -> ImageId {
        let id = ImageId::from_digest(&sha2::Sha256::digest(&bytes));
        self.images.insert(id, bytes);
        id
    }

    /// Stores `bytes` under a caller-supplied id, e.g. one just received
    /// over the wire from a peer.
    pub fn put_with_id(&mut self, id: ImageId, bytes: Vec<u8>) {
        self.images.insert(id, bytes);
    }

    pub fn get(&self, id: &ImageId) -> Option<&[u8]> {
        self.images.get(id).map(Vec::as_slice)
    }

    pub fn contains(&self, id: &ImageId) -> bool {
        self.images.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
