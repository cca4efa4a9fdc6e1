pub mod block;
pub mod clock;
pub mod consensus;
pub mod constants;
pub mod error;
pub mod hashing;
pub mod ledger;
pub mod mine;
pub mod pool;
pub mod pow;
pub mod store;
pub mod transaction;
pub mod validation;
pub mod wallet;

pub use block::Block;
pub use clock::{Clock, FixedClock, SystemClock};
pub use consensus::{PeerChain, PeerClient, PeerError, Resolution};
pub use error::LedgerError;
pub use hashing::Hash;
pub use ledger::{Ledger, Sealed};
pub use pool::TransactionPool;
pub use store::{ChainStore, MemoryStore, StoreError};
pub use transaction::Transaction;
pub use validation::{check_chain, is_valid, ChainFault};
pub use wallet::{P256Verifier, SignatureVerifier, Wallet, WalletError};
