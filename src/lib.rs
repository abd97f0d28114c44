//! A minimal proof-of-work ledger.
//!
//! - [`blockchain`] - sealed blocks and their canonical hash
//! - [`ledger`] - the local chain and pending transactions
//! - [`pow`] - proof-of-work predicate and the cancellable search
//! - [`validate`] - replaying linkage and proofs over a chain
//! - [`consensus`] - longest-valid-chain resolution against peers
//! - [`peer`] - HTTP client for peer chains
//! - [`storage`] - sled-backed chain snapshots
//! - [`node`] - shared ledger wiring mining and consensus together

#![forbid(unsafe_code)]

pub mod blockchain;
pub mod config;
pub mod consensus;
pub mod error;
pub mod ledger;
pub mod node;
pub mod peer;
pub mod pow;
pub mod storage;
pub mod tx;
pub mod validate;

pub use blockchain::{Block, BlockRecord, Timestamp};
pub use consensus::{ChainFetcher, ChainResponse, ConsensusResolver, Resolution};
pub use error::{FetchError, LedgerError, LedgerResult, MiningError};
pub use ledger::{Chain, Ledger};
pub use node::Node;
pub use pow::{mine, valid_proof, CancelFlag};
pub use tx::Transaction;
pub use validate::is_valid;
