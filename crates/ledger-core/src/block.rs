use crate::hashing::sha256_hex;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A sealed block. Nothing is validated at construction; that is the
/// ledger's job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: String,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl Block {
    pub fn seal(
        index: u64,
        timestamp: impl Into<String>,
        transactions: Vec<Transaction>,
        proof: u64,
        previous_hash: impl Into<String>,
    ) -> Self {
        Self {
            index,
            timestamp: timestamp.into(),
            transactions,
            proof,
            previous_hash: previous_hash.into(),
        }
    }

    /// The exact string fed to the digest: decimal index, timestamp, every
    /// transaction's `sender + receiver + amount` in order, decimal proof,
    /// previous hash. Part of the wire contract.
    pub fn hash_input(&self) -> String {
        let mut out = String::with_capacity(64 + self.timestamp.len() + self.previous_hash.len());
        out.push_str(&self.index.to_string());
        out.push_str(&self.timestamp);
        for tx in &self.transactions {
            out.push_str(&tx.hash_fragment());
        }
        out.push_str(&self.proof.to_string());
        out.push_str(&self.previous_hash);
        out
    }

    /// Lowercase hex SHA-256 of [`Block::hash_input`].
    pub fn hash(&self) -> String {
        sha256_hex(self.hash_input())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{Index: {}, Timestamp: {}, Transactions: {}, Proof: {}, PreviousHash: {}}}",
            self.index,
            self.timestamp,
            self.transactions.len(),
            self.proof,
            self.previous_hash
        )
    }
}
