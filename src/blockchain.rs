use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::tx::Transaction;

/// `previous_hash` carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "1";
/// Proof carried by the genesis block.
pub const GENESIS_PROOF: u64 = 100;

const MICROS_PER_SEC: i64 = 1_000_000;

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Seconds since the Unix epoch at microsecond resolution.
///
/// Stored as an integer so that the canonical hash text never depends on
/// float-to-string rules. On the wire it travels as a JSON number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    micros: i64,
}

impl Timestamp {
    pub fn now() -> Self {
        Self::from_micros(Utc::now().timestamp_micros())
    }

    pub fn from_micros(micros: i64) -> Self {
        Self { micros }
    }

    /// Rounds to the nearest microsecond.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self::from_micros((secs * MICROS_PER_SEC as f64).round() as i64)
    }

    pub fn as_micros(&self) -> i64 {
        self.micros
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.micros as f64 / MICROS_PER_SEC as f64
    }

    /// Decimal seconds with exactly six fractional digits, e.g. `1700000000.000042`.
    pub fn canonical(&self) -> String {
        let sign = if self.micros < 0 { "-" } else { "" };
        let abs = self.micros.unsigned_abs();
        let per_sec = MICROS_PER_SEC as u64;
        format!("{}{}.{:06}", sign, abs / per_sec, abs % per_sec)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_secs_f64())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Timestamp::from_secs_f64)
    }
}

/// Canonical text hashed for a block: compact JSON, keys in lexicographic
/// order, integers in plain decimal and the timestamp in fixed six-digit form.
pub fn canonical_block_text(
    index: u64,
    timestamp: Timestamp,
    transactions: &[Transaction],
    proof: u64,
    previous_hash: &str,
) -> String {
    let txs = transactions
        .iter()
        .map(|tx| {
            format!(
                r#"{{"amount":{},"recipient":{},"sender":{}}}"#,
                tx.amount,
                Value::from(tx.recipient.as_str()),
                Value::from(tx.sender.as_str()),
            )
        })
        .collect::<Vec<_>>()
        .join(",");

    format!(
        r#"{{"index":{},"previous_hash":{},"proof":{},"timestamp":{},"transactions":[{}]}}"#,
        index,
        Value::from(previous_hash),
        proof,
        timestamp.canonical(),
        txs,
    )
}

/// A block as exchanged with peers: every field, including the hash the
/// sender claims for it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub index: u64,
    pub timestamp: Timestamp,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
    pub hash: String,
}

/// A sealed block. Fields are read-only; the hash is derived at construction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "BlockRecord", into = "BlockRecord")]
pub struct Block {
    index: u64,
    timestamp: Timestamp,
    transactions: Vec<Transaction>,
    proof: u64,
    previous_hash: String,
    hash: String,
}

impl Block {
    pub fn new(
        index: u64,
        timestamp: Timestamp,
        transactions: Vec<Transaction>,
        proof: u64,
        previous_hash: String,
    ) -> Self {
        let hash = sha256_hex(
            canonical_block_text(index, timestamp, &transactions, proof, &previous_hash).as_bytes(),
        );
        Self {
            index,
            timestamp,
            transactions,
            proof,
            previous_hash,
            hash,
        }
    }

    pub fn genesis() -> Self {
        Self::new(
            1,
            Timestamp::now(),
            Vec::new(),
            GENESIS_PROOF,
            GENESIS_PREVIOUS_HASH.to_string(),
        )
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn proof(&self) -> u64 {
        self.proof
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    /// The hash carried with the block. For blocks built locally this is the
    /// derived hash; for blocks imported from a peer it is whatever they sent.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Recomputes the digest from the block's fields.
    pub fn compute_hash(&self) -> String {
        hash_block(self)
    }

    /// Whether the carried hash matches a fresh computation.
    pub fn is_intact(&self) -> bool {
        self.hash == self.compute_hash()
    }
}

/// Digest of a block's contents, ignoring the hash it carries.
pub fn hash_block(block: &Block) -> String {
    sha256_hex(
        canonical_block_text(
            block.index,
            block.timestamp,
            &block.transactions,
            block.proof,
            &block.previous_hash,
        )
        .as_bytes(),
    )
}

impl From<Block> for BlockRecord {
    fn from(block: Block) -> Self {
        Self {
            index: block.index,
            timestamp: block.timestamp,
            transactions: block.transactions,
            proof: block.proof,
            previous_hash: block.previous_hash,
            hash: block.hash,
        }
    }
}

impl From<BlockRecord> for Block {
    /// Keeps the sender's stated hash; validation compares it with
    /// [`Block::compute_hash`] rather than trusting it.
    fn from(record: BlockRecord) -> Self {
        Self {
            index: record.index,
            timestamp: record.timestamp,
            transactions: record.transactions,
            proof: record.proof,
            previous_hash: record.previous_hash,
            hash: record.hash,
        }
    }
}
