use serde::{Deserialize, Serialize};

/// A transfer recorded in a block.
///
/// The ledger treats this as opaque payload: nothing about the parties or the
/// amount is checked.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Who sends the funds.
    pub sender: String,
    /// Who receives the funds.
    pub recipient: String,
    /// The amount to transfer.
    pub amount: u64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: u64) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    /// The zero-value transfer the node enqueues before mining on its own.
    pub fn placeholder() -> Self {
        Self::new("sender", "recipient", 0)
    }
}
