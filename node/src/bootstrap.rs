//! Chain bootstrap (§4.7): fetch the chain from peers (or start a fresh
//! genesis alone), resolving divergent dumps by retrying rather than
//! attempting a partial merge (§9, §12 — preserved: a partial repair would
//! be the better design for a new implementation but changes the protocol).

use crate::error::Error;
use imgchain_core::miner::mine_blocking;
use imgchain_core::{BlockHash, Chain, Config};
use imgchain_net::conn::recv_until_end;
use imgchain_net::{Peer, Tag};
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;
use tracing::{info, warn};

/// How long to wait before retrying bootstrap after peers disagree.
const DIVERGENCE_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Bootstraps a chain following §4.7's three cases:
/// - no peers: mine a fresh genesis alone at `config.genesis_difficulty`
///   (matching the original's `Blockchain(3)` solo-start path, distinct
///   from the usual running default), then carry the chain forward at
///   `config.running_difficulty`.
/// - one peer: fetch and trust its dump.
/// - two or more peers: sample two at random; if their dumps disagree,
///   sleep and retry (recursively) rather than merging.
pub fn bootstrap_chain(peers: &[Arc<Peer>], config: &Config) -> crate::error::Result<Chain> {
    if peers.is_empty() {
        info!("no peers found, mining a fresh genesis block");
        let genesis = mine_blocking(BlockHash::zero(), Vec::new(), config.genesis_difficulty);
        return Chain::from_parts(vec![genesis], config.running_difficulty).map_err(Error::from);
    }

    let sample: Vec<&Arc<Peer>> = if peers.len() == 1 {
        vec![&peers[0]]
    } else {
        let mut rng = rand::thread_rng();
        peers.choose_multiple(&mut rng, 2).collect()
    };

    let mut dumps = Vec::new();
    for peer in &sample {
        peer.send_tag(Tag::BlockchainRequested)?;
        let mut reader = peer.try_clone_stream()?;
        let dump = recv_until_end(&mut reader)?;
        dumps.push(dump);
    }
    dumps.sort();
    dumps.dedup();

    if dumps.len() != 1 {
        warn!("peers disagree on the chain, retrying bootstrap in 2s");
        sleep(DIVERGENCE_RETRY_DELAY);
        return bootstrap_chain(peers, config);
    }

    Chain::decode(&dumps[0]).map_err(Error::from)
}
