use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::blockchain::{hash_block, sha256_hex, Block};
use crate::error::MiningError;

/// Required prefix of a winning guess digest: four hex zero characters.
pub const DIFFICULTY_PREFIX: &str = "0000";

/// The exact bytes hashed for a guess: `last_proof`, `proof` and `last_hash`
/// concatenated with no separators. Peers must agree on this format bit for bit.
pub fn proof_guess(last_proof: u64, proof: u64, last_hash: &str) -> String {
    format!("{}{}{}", last_proof, proof, last_hash)
}

pub fn valid_proof(last_proof: u64, proof: u64, last_hash: &str) -> bool {
    sha256_hex(proof_guess(last_proof, proof, last_hash).as_bytes()).starts_with(DIFFICULTY_PREFIX)
}

/// Cooperative cancellation signal shared between a miner and whoever wants
/// to stop it.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Searches upward from zero for the smallest proof satisfying
/// [`valid_proof`] against `last_block`.
///
/// There is no attempt limit. The flag is polled before every attempt, so a
/// caller needing bounded latency cancels it from elsewhere.
pub fn mine(last_block: &Block, cancel: &CancelFlag) -> Result<u64, MiningError> {
    let last_proof = last_block.proof();
    let last_hash = hash_block(last_block);

    let mut proof: u64 = 0;
    loop {
        if cancel.is_cancelled() {
            debug!(index = last_block.index(), attempts = proof, "mining cancelled");
            return Err(MiningError::Cancelled { attempts: proof });
        }
        if valid_proof(last_proof, proof, &last_hash) {
            debug!(index = last_block.index(), proof, "proof found");
            return Ok(proof);
        }
        proof += 1;
    }
}
