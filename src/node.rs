//! A ledger replica shared between a miner and the consensus resolver.
//!
//! The chain and the pending queue sit behind one `RwLock`. Sealing a block
//! and replacing the chain both take the write half, so neither can observe
//! the other half-done. Mining itself runs on the blocking pool without the
//! lock and is cancelled when a peer chain is adopted.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::blockchain::{hash_block, Block};
use crate::consensus::ConsensusResolver;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;
use crate::pow::{mine, CancelFlag};
use crate::storage::ChainStore;
use crate::tx::Transaction;
use crate::validate::is_valid;

pub struct Node {
    ledger: Arc<RwLock<Ledger>>,
    resolver: ConsensusResolver,
    peers: Vec<String>,
    store: Option<ChainStore>,
    /// Shared by every search in flight; swapped for a fresh one on cancel.
    mining: Mutex<CancelFlag>,
}

impl Node {
    pub fn new(ledger: Ledger, resolver: ConsensusResolver, peers: Vec<String>) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
            resolver,
            peers,
            store: None,
            mining: Mutex::new(CancelFlag::new()),
        }
    }

    /// Persists the chain to `store` after every change.
    pub fn with_store(mut self, store: ChainStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn ledger(&self) -> Arc<RwLock<Ledger>> {
        self.ledger.clone()
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub async fn enqueue_transaction(&self, tx: Transaction) -> u64 {
        self.ledger.write().await.enqueue_transaction(tx)
    }

    /// Mines a proof for the current tip and seals the pending transactions.
    ///
    /// Fails with [`LedgerError::StaleTip`] if the tip changed while mining
    /// and with a cancellation error if [`Node::cancel_mining`] was called.
    pub async fn mine_block(&self) -> LedgerResult<Block> {
        let tip = self.ledger.read().await.tip().clone();
        let tip_hash = hash_block(&tip);
        let cancel = self.mining.lock().await.clone();

        info!(index = tip.index() + 1, "mining");
        let proof = tokio::task::spawn_blocking(move || mine(&tip, &cancel))
            .await
            .map_err(|e| LedgerError::MiningTask(e.to_string()))??;

        let mut ledger = self.ledger.write().await;
        let block = ledger.seal_on(&tip_hash, proof)?.clone();
        self.persist(&ledger)?;
        Ok(block)
    }

    /// Stops every proof search currently running on this node.
    pub async fn cancel_mining(&self) {
        let mut current = self.mining.lock().await;
        current.cancel();
        *current = CancelFlag::new();
    }

    /// Runs a consensus round against the configured peers. Returns whether
    /// the local chain was replaced.
    pub async fn resolve_conflicts(&self) -> LedgerResult<bool> {
        let local_len = self.ledger.read().await.chain().len();
        let Some(candidate) = self.resolver.find_candidate(local_len, &self.peers).await else {
            info!(local_len, peers = self.peers.len(), "local chain is authoritative");
            return Ok(false);
        };

        let mut ledger = self.ledger.write().await;
        if !ledger.replace_chain(candidate) {
            warn!("local chain grew past the candidate during the round");
            return Ok(false);
        }
        self.cancel_mining().await;
        self.persist(&ledger)?;
        Ok(true)
    }

    pub async fn is_chain_valid(&self) -> bool {
        is_valid(self.ledger.read().await.chain().blocks())
    }

    fn persist(&self, ledger: &Ledger) -> LedgerResult<()> {
        match &self.store {
            Some(store) => store.save_chain(ledger.chain()),
            None => Ok(()),
        }
    }
}
