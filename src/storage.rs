use std::path::Path;

use sled::Db;
use tracing::debug;

use crate::blockchain::Block;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Chain;
use crate::validate::is_valid;

const LATEST_KEY: &[u8] = b"latest";

/// Chain snapshot store backed by sled. Blocks are JSON records keyed by
/// their big-endian index; `latest` holds the tip index.
pub struct ChainStore {
    db: Db,
}

fn block_key(index: u64) -> [u8; 8] {
    index.to_be_bytes()
}

impl ChainStore {
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Writes every block of `chain`, drops any stale blocks past its tip
    /// (left over from a longer chain that was since replaced) and flushes.
    pub fn save_chain(&self, chain: &Chain) -> LedgerResult<()> {
        let mut batch = sled::Batch::default();
        for block in chain.blocks() {
            batch.insert(block_key(block.index()).to_vec(), serde_json::to_vec(block)?);
        }
        let tip = chain.tip().index();
        for entry in self.db.range(block_key(tip.saturating_add(1))..) {
            let (key, _) = entry?;
            if key.len() == 8 {
                batch.remove(key);
            }
        }
        batch.insert(LATEST_KEY, block_key(tip).to_vec());
        self.db.apply_batch(batch)?;
        self.db.flush()?;
        debug!(blocks = chain.len(), "chain saved");
        Ok(())
    }

    /// The stored chain, or `None` if nothing was saved yet. A stored chain
    /// that fails validation is an error.
    pub fn load_chain(&self) -> LedgerResult<Option<Chain>> {
        let Some(tip) = self.latest_index()? else {
            return Ok(None);
        };

        // `tip` is read from disk; a bad pointer must surface as a missing block.
        let mut blocks = Vec::new();
        for index in 1..=tip {
            let bytes = self
                .db
                .get(block_key(index))?
                .ok_or(LedgerError::InvalidChain)?;
            let block: Block = serde_json::from_slice(&bytes)?;
            blocks.push(block);
        }

        if !is_valid(&blocks) {
            return Err(LedgerError::InvalidChain);
        }
        Ok(Some(Chain::try_from(blocks)?))
    }

    fn latest_index(&self) -> LedgerResult<Option<u64>> {
        let Some(v) = self.db.get(LATEST_KEY)? else {
            return Ok(None);
        };
        let bytes: [u8; 8] = v.as_ref().try_into().map_err(|_| LedgerError::InvalidChain)?;
        Ok(Some(u64::from_be_bytes(bytes)))
    }
}
