//! The mining-poll loop (§4.6, §5): drains the current miner's completion
//! channel on a fixed interval, accepts the sealed candidate onto the
//! chain, broadcasts it, and resets for the next one. Does not itself
//! mine — the miner lives on its own thread, restarted by
//! [`crate::node::Node::add_transaction`].

use crate::bootstrap::bootstrap_chain;
use crate::node::Node;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use tracing::info;

pub fn run_mining_poll_loop(node: Arc<Node>) {
    loop {
        if !node.running.load(Ordering::Relaxed) {
            return;
        }

        if let Some(sealed) = node.try_take_sealed() {
            info!("block mined");
            let block = {
                let mut state = node.lock_state();
                state.candidate.seal(sealed.nonce, sealed.timestamp_ns, sealed.hash);
                state.candidate.clone()
            };

            let accepted = node.receive_block(block.clone());
            if !accepted {
                let peers: Vec<_> = node.lock_state().peers.values().cloned().collect();
                if let Ok(chain) = bootstrap_chain(&peers, &node.config) {
                    node.lock_state().chain = chain;
                    node.lock_state().reset_candidate();
                }
                continue;
            }

            match node.send_block(&block) {
                Ok(true) => {
                    let peers: Vec<_> = node.lock_state().peers.values().cloned().collect();
                    if let Ok(chain) = bootstrap_chain(&peers, &node.config) {
                        node.lock_state().chain = chain;
                        node.lock_state().reset_candidate();
                    }
                }
                Ok(false) => {}
                Err(e) => tracing::warn!(error = %e, "failed to broadcast mined block"),
            }
        }

        thread::sleep(node.config.mining_poll_interval);
    }
}
