//! Error type for the **imgchain** networking crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("core decode error: {0}")]
    Core(#[from] imgchain_core::Error),

    #[error("unrecognized frame tag {0:?}")]
    UnknownTag([u8; 3]),

    #[error("peer at {0} is not in the directory")]
    UnknownPeer(std::net::SocketAddr),

    #[error("connection closed by peer")]
    ConnectionClosed,
}

pub type Result<T> = core::result::Result<T, Error>;
