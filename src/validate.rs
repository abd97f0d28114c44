use tracing::debug;

use crate::blockchain::{hash_block, Block};
use crate::pow::valid_proof;

/// Replays linkage and proof-of-work across `chain`.
///
/// A chain of zero or one block is trivially valid. Otherwise every block
/// must carry the hash its fields produce and sit at its 1-based position
/// (`chain[i].index == i + 1`), and each pair must satisfy:
/// * `cur.previous_hash == hash(prev)`, recomputed here rather than taken
///   from `prev.hash()`;
/// * `valid_proof(prev.proof, cur.proof, hash(prev))`.
///
/// Stops at the first failing block.
pub fn is_valid(chain: &[Block]) -> bool {
    if chain.len() <= 1 {
        return true;
    }
    let positioned = chain.iter().zip(1u64..).all(|(block, position)| {
        if block.index() != position {
            debug!(index = block.index(), position, "index does not match chain position");
            return false;
        }
        if !block.is_intact() {
            debug!(index = block.index(), "carried hash does not match contents");
            return false;
        }
        true
    });
    if !positioned {
        return false;
    }

    chain.windows(2).all(|pair| {
        let (prev, cur) = (&pair[0], &pair[1]);
        let prev_hash = hash_block(prev);

        if cur.previous_hash() != prev_hash {
            debug!(index = cur.index(), "previous_hash does not link to predecessor");
            return false;
        }
        if !valid_proof(prev.proof(), cur.proof(), &prev_hash) {
            debug!(index = cur.index(), proof = cur.proof(), "invalid proof of work");
            return false;
        }
        true
    })
}
