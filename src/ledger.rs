use tracing::info;

use crate::blockchain::{hash_block, Block, Timestamp};
use crate::error::LedgerError;
use crate::tx::Transaction;

/// An ordered, never-empty sequence of blocks.
///
/// The only ways to obtain one are [`Chain::genesis`] and the fallible
/// `TryFrom<Vec<Block>>`, so a chain without a tip cannot exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    pub fn genesis() -> Self {
        Self {
            blocks: vec![Block::genesis()],
        }
    }

    pub fn tip(&self) -> &Block {
        self.blocks
            .last()
            .expect("chain invariant: at least the genesis block is present")
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }
}

impl TryFrom<Vec<Block>> for Chain {
    type Error = LedgerError;

    fn try_from(blocks: Vec<Block>) -> Result<Self, Self::Error> {
        if blocks.is_empty() {
            return Err(LedgerError::EmptyChain);
        }
        Ok(Self { blocks })
    }
}

impl From<Chain> for Vec<Block> {
    fn from(chain: Chain) -> Self {
        chain.blocks
    }
}

/// The local chain plus transactions waiting for the next block.
#[derive(Debug, Clone)]
pub struct Ledger {
    chain: Chain,
    current_transactions: Vec<Transaction>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Starts a ledger holding only a fresh genesis block.
    pub fn new() -> Self {
        Self::from_chain(Chain::genesis())
    }

    pub fn from_chain(chain: Chain) -> Self {
        Self {
            chain,
            current_transactions: Vec::new(),
        }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn tip(&self) -> &Block {
        self.chain.tip()
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.current_transactions
    }

    /// Queues `tx` for the next block and returns that block's index.
    pub fn enqueue_transaction(&mut self, tx: Transaction) -> u64 {
        self.current_transactions.push(tx);
        self.tip().index() + 1
    }

    /// Seals the pending transactions into a new block on top of the tip.
    ///
    /// `previous_hash` defaults to the hash of the current tip.
    pub fn seal_block(&mut self, proof: u64, previous_hash: Option<String>) -> &Block {
        let previous_hash = previous_hash.unwrap_or_else(|| hash_block(self.tip()));
        let index = self.chain.len() as u64 + 1;
        let transactions = std::mem::take(&mut self.current_transactions);

        let block = Block::new(index, Timestamp::now(), transactions, proof, previous_hash);
        info!(
            index,
            proof,
            txs = block.transactions().len(),
            hash = &block.hash()[..12],
            "sealed block"
        );
        self.chain.push(block);
        self.tip()
    }

    /// Like [`Ledger::seal_block`], but only if the tip still hashes to
    /// `expected_tip`, i.e. the proof was mined against the current tip.
    pub fn seal_on(&mut self, expected_tip: &str, proof: u64) -> Result<&Block, LedgerError> {
        let tip_hash = hash_block(self.tip());
        if tip_hash != expected_tip {
            return Err(LedgerError::StaleTip {
                expected: expected_tip.to_string(),
                found: tip_hash,
            });
        }
        Ok(self.seal_block(proof, Some(tip_hash)))
    }

    /// Swaps in `candidate` if it is strictly longer than the local chain.
    /// Returns whether the swap happened. Pending transactions are kept.
    pub fn replace_chain(&mut self, candidate: Chain) -> bool {
        if candidate.len() <= self.chain.len() {
            return false;
        }
        info!(
            old_len = self.chain.len(),
            new_len = candidate.len(),
            "replacing local chain"
        );
        self.chain = candidate;
        true
    }
}
