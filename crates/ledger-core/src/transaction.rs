use crate::constants::SYSTEM_SENDER;
use serde::{Deserialize, Serialize};

/// A transfer of value between two addresses.
///
/// `amount` is deliberately unchecked for sign and finiteness; the ledger
/// admits whatever the boundary hands it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub receiver: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Transaction {
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: f64,
        signature: Option<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
            signature,
        }
    }

    /// An unsigned transfer issued by the system sender.
    pub fn system(receiver: impl Into<String>, amount: f64) -> Self {
        Self::new(SYSTEM_SENDER, receiver, amount, None)
    }

    pub fn is_system(&self) -> bool {
        self.sender == SYSTEM_SENDER
    }

    /// The message a sender signs: `sender + receiver + decimal(amount)`.
    pub fn signing_payload(&self) -> String {
        signing_payload(&self.sender, &self.receiver, self.amount)
    }

    /// Canonical string this transaction contributes to its block's hash.
    pub fn hash_fragment(&self) -> String {
        self.signing_payload()
    }
}

pub fn signing_payload(sender: &str, receiver: &str, amount: f64) -> String {
    format!("{sender}{receiver}{}", format_amount(amount))
}

/// Shortest decimal form that round-trips, never in exponent notation
/// (`100.0` -> `"100"`, `0.1` -> `"0.1"`).
pub fn format_amount(amount: f64) -> String {
    amount.to_string()
}
