//! imgchain networking
//!
//! The wire protocol every peer (and the tracker, for its own smaller
//! dialect) speaks: 3-byte ASCII frame tags, fixed or `END`-terminated
//! payloads, and a directory keyed by a peer's advertised listening
//! address.

pub mod conn;
pub mod error;
pub mod frame;
pub mod peers;

pub use conn::Peer;
pub use error::{Error, Result};
pub use frame::Tag;
pub use peers::{PeerDirectory, PeerKey};
