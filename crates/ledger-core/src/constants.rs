pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// Hex prefix a proof digest must carry to satisfy the difficulty predicate.
pub const POW_PREFIX: &str = "0000";
pub const GENESIS_PROOF: u64 = 1;
pub const GENESIS_PREVIOUS_HASH: &str = "0";
/// Sender used for system-issued transfers (rewards, faucets). Never signed.
pub const SYSTEM_SENDER: &str = "0";
pub const MINING_REWARD: f64 = 50.0;
