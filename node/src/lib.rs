pub mod bootstrap;
pub mod error;
pub mod identity;
pub mod listener;
pub mod mining;
pub mod node;
pub mod startup;
pub mod state;
pub mod tracker;
pub mod wire_strings;

pub use error::{Error, Result};
pub use identity::Identity;
pub use node::{MintOutcome, Node, TransferOutcome};
pub use startup::{bootstrap_and_run, Running};
pub use state::NodeState;
pub use tracker::{LoginPrompts, PeerInfo};
