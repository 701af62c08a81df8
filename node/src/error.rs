//! Error type for the **imgchain** node crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Net(#[from] imgchain_net::Error),

    #[error(transparent)]
    Core(#[from] imgchain_core::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no peers available to bootstrap the chain from")]
    NoPeers,

    #[error("tracker at {0} sent a malformed response")]
    MalformedTracker(String),

    #[error("peer at {0} rejected our hello")]
    HandshakeRejected(std::net::SocketAddr),
}

pub type Result<T> = core::result::Result<T, Error>;
