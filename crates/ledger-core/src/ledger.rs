use crate::block::Block;
use crate::clock::{Clock, SystemClock};
use crate::constants::{GENESIS_PREVIOUS_HASH, GENESIS_PROOF, MINING_REWARD};
use crate::error::{LedgerError, Result};
use crate::pool::TransactionPool;
use crate::pow::{find_proof, find_proof_cancellable};
use crate::store::{ChainStore, StoreError};
use crate::transaction::Transaction;
use crate::validation::{check_chain, parse_timestamp, ChainFault};
use crate::wallet::SignatureVerifier;
use chrono::{DateTime, SecondsFormat, TimeDelta, Timelike, Utc};
use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

/// Outcome of sealing a block. The block is on the chain regardless of
/// whether persisting it worked; `persisted` says which.
#[derive(Debug)]
pub struct Sealed {
    pub block: Block,
    pub persisted: std::result::Result<(), StoreError>,
}

#[derive(Debug, Default)]
struct LedgerState {
    chain: Vec<Block>,
    pool: TransactionPool,
    nodes: BTreeSet<String>,
}

/// The chain, its pending pool and the known peers behind a single
/// exclusive lock. Reads take the same lock as writes.
pub struct Ledger<S: ChainStore, V: SignatureVerifier> {
    state: Mutex<LedgerState>,
    store: Arc<S>,
    verifier: Arc<V>,
    clock: Box<dyn Clock>,
}

impl<S: ChainStore, V: SignatureVerifier> Ledger<S, V> {
    /// Loads the persisted chain, or mints a genesis block when there is
    /// none (missing, corrupt or empty).
    pub fn open(store: Arc<S>, verifier: Arc<V>) -> Self {
        Self::open_with_clock(store, verifier, SystemClock)
    }

    pub fn open_with_clock(store: Arc<S>, verifier: Arc<V>, clock: impl Clock + 'static) -> Self {
        let ledger = Self::empty(store, verifier, clock);
        match ledger.store.load() {
            Ok(chain) if !chain.is_empty() => {
                info!(length = chain.len(), "loaded persisted chain");
                ledger.state().chain = chain;
            }
            Ok(_) => {
                info!("no persisted chain, minting genesis");
                ledger.mint_genesis();
            }
            Err(err) => {
                warn!(error = %err, "could not load persisted chain, minting genesis");
                ledger.mint_genesis();
            }
        }
        ledger
    }

    /// A fresh ledger holding only a genesis block, ignoring stored state.
    pub fn new(store: Arc<S>, verifier: Arc<V>) -> Self {
        Self::new_with_clock(store, verifier, SystemClock)
    }

    pub fn new_with_clock(store: Arc<S>, verifier: Arc<V>, clock: impl Clock + 'static) -> Self {
        let ledger = Self::empty(store, verifier, clock);
        ledger.mint_genesis();
        ledger
    }

    fn empty(store: Arc<S>, verifier: Arc<V>, clock: impl Clock + 'static) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            store,
            verifier,
            clock: Box::new(clock),
        }
    }

    fn mint_genesis(&self) {
        let _ = self.create_block(GENESIS_PROOF, GENESIS_PREVIOUS_HASH);
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn verifier(&self) -> &Arc<V> {
        &self.verifier
    }

    /// Seals the pending pool into a new block on top of the chain and
    /// persists the chain. A persistence failure is logged and reported in
    /// [`Sealed::persisted`]; the block stays appended and the pool cleared.
    pub fn create_block(&self, proof: u64, previous_hash: impl Into<String>) -> Sealed {
        let mut state = self.state();
        self.seal_locked(&mut state, proof, previous_hash.into())
    }

    fn seal_locked(&self, state: &mut LedgerState, proof: u64, previous_hash: String) -> Sealed {
        let index = state.chain.len() as u64 + 1;
        let timestamp = self.stamp(state.chain.last());
        let transactions = state.pool.take();
        let block = Block::seal(index, timestamp, transactions, proof, previous_hash);
        state.chain.push(block.clone());

        let persisted = self.store.save(&state.chain);
        if let Err(err) = &persisted {
            warn!(index, error = %err, "block sealed but chain not persisted");
        }
        info!(
            index,
            proof,
            txs = block.transactions.len(),
            "block sealed"
        );
        Sealed { block, persisted }
    }

    /// Current time, bumped past the tip's timestamp if the clock has not
    /// moved beyond it.
    fn stamp(&self, tip: Option<&Block>) -> String {
        let mut now = truncate_micros(self.clock.now());
        if let Some(previous) = tip.and_then(|b| parse_timestamp(&b.timestamp)) {
            if now <= previous {
                now = truncate_micros(previous) + TimeDelta::microseconds(1);
            }
        }
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// The chain is never empty after construction, so this panics only on
    /// a broken invariant.
    pub fn latest_block(&self) -> Block {
        self.state()
            .chain
            .last()
            .cloned()
            .expect("ledger chain is never empty after construction")
    }

    /// Verifies and queues a transfer. Returns the index of the block it is
    /// expected to land in, which is advisory only.
    pub fn submit(
        &self,
        sender: &str,
        receiver: &str,
        amount: f64,
        signature: Option<String>,
    ) -> Result<u64> {
        self.admit(Transaction::new(sender, receiver, amount, signature))
    }

    pub fn admit(&self, tx: Transaction) -> Result<u64> {
        if tx.sender.trim().is_empty() {
            return Err(LedgerError::MalformedTransaction("empty sender".into()));
        }
        if tx.receiver.trim().is_empty() {
            return Err(LedgerError::MalformedTransaction("empty receiver".into()));
        }
        if !tx.is_system() {
            let verified = tx.signature.as_deref().is_some_and(|sig| {
                self.verifier
                    .verify(&tx.sender, &tx.signing_payload(), sig)
            });
            if !verified {
                return Err(LedgerError::InvalidSignature(tx.sender));
            }
        }

        let mut state = self.state();
        state.pool.push(tx);
        Ok(state.chain.len() as u64 + 1)
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.state().pool.pending().to_vec()
    }

    /// Net of every transfer touching `address`, recomputed from the whole
    /// chain on each call. System transfers only ever credit.
    pub fn balance(&self, address: &str) -> f64 {
        let state = self.state();
        let mut balance = 0.0;
        for tx in state.chain.iter().flat_map(|b| b.transactions.iter()) {
            if tx.sender == address && !tx.is_system() {
                balance -= tx.amount;
            }
            if tx.receiver == address {
                balance += tx.amount;
            }
        }
        balance
    }

    pub fn chain_length(&self) -> usize {
        self.state().chain.len()
    }

    /// Block at a 1-based position.
    pub fn block_at(&self, index: u64) -> Result<Block> {
        let state = self.state();
        index
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| state.chain.get(i).cloned())
            .ok_or(LedgerError::BlockNotFound(index))
    }

    pub fn chain(&self) -> Vec<Block> {
        self.state().chain.clone()
    }

    pub fn check(&self, chain: &[Block]) -> std::result::Result<(), ChainFault> {
        check_chain(chain, self.verifier.as_ref())
    }

    pub fn is_valid(&self, chain: &[Block]) -> bool {
        self.check(chain).is_ok()
    }

    pub fn is_chain_valid(&self) -> bool {
        let chain = self.chain();
        self.is_valid(&chain)
    }

    /// Writes the current chain to the store, surfacing any failure.
    pub fn save(&self) -> std::result::Result<(), StoreError> {
        let state = self.state();
        self.store.save(&state.chain)
    }

    /// Adds a peer. Registering the same address twice is a no-op.
    pub fn register_node(&self, address: &str) -> Result<()> {
        let address = normalize_peer(address)?;
        self.state().nodes.insert(address);
        Ok(())
    }

    /// Adds every peer in `addresses`, or none of them if any is malformed.
    pub fn register_nodes<A: AsRef<str>>(&self, addresses: &[A]) -> Result<()> {
        let normalized = addresses
            .iter()
            .map(|address| normalize_peer(address.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.state().nodes.extend(normalized);
        Ok(())
    }

    pub fn nodes(&self) -> Vec<String> {
        self.state().nodes.iter().cloned().collect()
    }

    /// Swaps in `candidate` if it is still longer than the local chain, then
    /// persists. Callers validate the candidate first.
    pub(crate) fn replace_if_longer(&self, candidate: Vec<Block>) -> bool {
        let mut state = self.state();
        let old_length = state.chain.len();
        if candidate.len() <= old_length {
            return false;
        }
        state.chain = candidate;
        info!(old_length, new_length = state.chain.len(), "chain replaced");
        if let Err(err) = self.store.save(&state.chain) {
            warn!(error = %err, "replacement chain not persisted");
        }
        true
    }

    pub fn previous_hash(&self) -> String {
        self.latest_block().hash()
    }

    pub fn latest_timestamp(&self) -> String {
        self.latest_block().timestamp
    }

    /// The proof that would seal the next block on the current tip.
    pub fn next_proof(&self) -> u64 {
        find_proof(self.latest_block().proof)
    }

    /// Mines the next block: searches a proof for the current tip without
    /// holding the lock, then seals, crediting [`MINING_REWARD`] to
    /// `reward_to` if given. Fails with [`LedgerError::StaleTip`] if another
    /// block landed in the meantime.
    pub fn mine(&self, reward_to: Option<&str>) -> Result<Sealed> {
        self.mine_with(reward_to, |last_proof| Some(find_proof(last_proof)))
    }

    pub fn mine_cancellable(&self, reward_to: Option<&str>, cancel: &AtomicBool) -> Result<Sealed> {
        self.mine_with(reward_to, |last_proof| {
            find_proof_cancellable(last_proof, cancel)
        })
    }

    /// [`Ledger::mine`] with a caller-chosen proof search; `None` from the
    /// search means it was cancelled.
    pub fn mine_with<F>(&self, reward_to: Option<&str>, search: F) -> Result<Sealed>
    where
        F: FnOnce(u64) -> Option<u64>,
    {
        if let Some(address) = reward_to {
            if address.trim().is_empty() {
                return Err(LedgerError::MalformedTransaction("empty reward address".into()));
            }
        }

        let tip = self.latest_block();
        let tip_hash = tip.hash();
        let proof = search(tip.proof).ok_or(LedgerError::Cancelled)?;

        let mut state = self.state();
        let unchanged = state
            .chain
            .last()
            .is_some_and(|b| b.index == tip.index && b.hash() == tip_hash);
        if !unchanged {
            return Err(LedgerError::StaleTip { expected: tip.index });
        }
        if let Some(address) = reward_to {
            state.pool.push(Transaction::system(address, MINING_REWARD));
        }
        Ok(self.seal_locked(&mut state, proof, tip_hash))
    }
}

fn truncate_micros(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_nanosecond(t.nanosecond() / 1_000 * 1_000).unwrap_or(t)
}

/// Trims whitespace and trailing slashes; rejects empty addresses.
/// An `http://` or `https://` scheme is kept if present.
pub fn normalize_peer(address: &str) -> Result<String> {
    let trimmed = address.trim();
    let (scheme, rest) = ["http://", "https://"]
        .iter()
        .find_map(|scheme| trimmed.strip_prefix(*scheme).map(|rest| (*scheme, rest)))
        .unwrap_or(("", trimmed));
    let host = rest.trim_end_matches('/');
    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(LedgerError::MalformedPeer(address.to_string()));
    }
    Ok(format!("{scheme}{host}"))
}

#[cfg(test)]
impl<S: ChainStore, V: SignatureVerifier> Ledger<S, V> {
    pub(crate) fn without_genesis(store: Arc<S>, verifier: Arc<V>) -> Self {
        Self::empty(store, verifier, SystemClock)
    }

    pub(crate) fn replace_chain_unchecked(&self, chain: Vec<Block>) {
        self.state().chain = chain;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::MemoryStore;
    use crate::wallet::{P256Verifier, Wallet};
    use chrono::TimeZone;

    type TestLedger = Ledger<MemoryStore, P256Verifier>;

    fn fixed(h: u32) -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2025, 7, 6, h, 0, 0).unwrap())
    }

    fn ledger() -> TestLedger {
        Ledger::new(Arc::new(MemoryStore::new()), Arc::new(P256Verifier))
    }

    struct FailingStore;

    impl ChainStore for FailingStore {
        fn load(&self) -> std::result::Result<Vec<Block>, StoreError> {
            Err(std::io::Error::other("disk gone").into())
        }
        fn save(&self, _chain: &[Block]) -> std::result::Result<(), StoreError> {
            Err(std::io::Error::other("disk gone").into())
        }
    }

    #[test]
    fn genesis_block_example() {
        let ledger = Ledger::new_with_clock(
            Arc::new(MemoryStore::new()),
            Arc::new(P256Verifier),
            fixed(12),
        );
        assert_eq!(ledger.chain_length(), 1);
        let genesis = ledger.latest_block();
        assert_eq!(genesis.index, 1);
        assert_eq!(genesis.proof, 1);
        assert_eq!(genesis.previous_hash, "0");
        assert_eq!(genesis.timestamp, "2025-07-06T12:00:00.000000Z");
        assert!(genesis.transactions.is_empty());
    }

    #[test]
    fn create_block_seals_pool_in_order() {
        let ledger = ledger();
        ledger.submit("0", "alice", 10.0, None).unwrap();
        ledger.submit("0", "bob", 20.0, None).unwrap();
        let before = ledger.pending();

        let tip = ledger.latest_block();
        let sealed = ledger.create_block(find_proof(tip.proof), tip.hash());
        assert!(sealed.persisted.is_ok());
        assert_eq!(sealed.block.index, 2);
        assert_eq!(sealed.block.transactions, before);
        assert!(ledger.pending().is_empty());
        assert_eq!(ledger.latest_block(), sealed.block);
    }

    #[test]
    fn chains_built_by_create_block_validate() {
        let ledger = ledger();
        for _ in 0..3 {
            let tip = ledger.latest_block();
            let _ = ledger.create_block(find_proof(tip.proof), tip.hash());
        }
        assert_eq!(ledger.chain_length(), 4);
        assert!(ledger.is_chain_valid());
    }

    #[test]
    fn timestamps_strictly_increase_under_a_frozen_clock() {
        let ledger = Ledger::new_with_clock(
            Arc::new(MemoryStore::new()),
            Arc::new(P256Verifier),
            fixed(12),
        );
        let tip = ledger.latest_block();
        let second = ledger.create_block(93711, tip.hash()).block;
        assert_eq!(second.timestamp, "2025-07-06T12:00:00.000001Z");
        assert!(ledger.is_chain_valid());
    }

    #[test]
    fn persistence_failure_is_reported_but_block_kept() {
        let ledger: Ledger<FailingStore, P256Verifier> =
            Ledger::open(Arc::new(FailingStore), Arc::new(P256Verifier));
        assert_eq!(ledger.chain_length(), 1);

        ledger.submit("0", "alice", 5.0, None).unwrap();
        let tip = ledger.latest_block();
        let sealed = ledger.create_block(93711, tip.hash());
        assert!(sealed.persisted.is_err());
        assert_eq!(ledger.chain_length(), 2);
        assert!(ledger.pending().is_empty());
        assert!(ledger.save().is_err());
    }

    #[test]
    fn open_prefers_persisted_chain() {
        let store = Arc::new(MemoryStore::new());
        let first = Ledger::new(store.clone(), Arc::new(P256Verifier));
        let _ = first.mine(None).unwrap();
        assert_eq!(store.saved().len(), 2);

        let reopened = Ledger::open(store, Arc::new(P256Verifier));
        assert_eq!(reopened.chain(), first.chain());
    }

    #[test]
    fn submit_returns_next_index_and_queues() {
        let ledger = ledger();
        let wallet = Wallet::generate();
        let sig = wallet.sign_transfer("bob", 50.0);
        let index = ledger.submit(&wallet.address(), "bob", 50.0, Some(sig)).unwrap();
        assert_eq!(index, 2);
        assert_eq!(ledger.pending().len(), 1);
        assert_eq!(ledger.pending()[0].receiver, "bob");
    }

    #[test]
    fn submit_rejects_bad_or_missing_signature() {
        let ledger = ledger();
        let wallet = Wallet::generate();
        let sig = wallet.sign_transfer("bob", 50.0);
        assert!(matches!(
            ledger.submit(&wallet.address(), "bob", 51.0, Some(sig)),
            Err(LedgerError::InvalidSignature(_))
        ));
        assert!(matches!(
            ledger.submit(&wallet.address(), "bob", 50.0, None),
            Err(LedgerError::InvalidSignature(_))
        ));
        assert!(matches!(
            ledger.submit("", "bob", 1.0, None),
            Err(LedgerError::MalformedTransaction(_))
        ));
        assert!(matches!(
            ledger.submit("0", " ", 1.0, None),
            Err(LedgerError::MalformedTransaction(_))
        ));
        assert!(ledger.pending().is_empty());
    }

    #[test]
    fn negative_amounts_are_admitted() {
        let ledger = ledger();
        assert!(ledger.submit("0", "alice", -5.0, None).is_ok());
    }

    #[test]
    fn balance_after_reward_and_spend() {
        let ledger = ledger();
        let wallet = Wallet::generate();
        let addr = wallet.address();

        ledger.submit("0", &addr, 50.0, None).unwrap();
        let _ = ledger.mine(None).unwrap();
        let sig = wallet.sign_transfer("bob", 20.0);
        ledger.submit(&addr, "bob", 20.0, Some(sig)).unwrap();
        let _ = ledger.mine(None).unwrap();

        assert_eq!(ledger.balance(&addr), 30.0);
        assert_eq!(ledger.balance("bob"), 20.0);
        assert_eq!(ledger.balance("0"), 0.0);
        assert_eq!(ledger.balance("nobody"), 0.0);
        assert!(ledger.is_chain_valid());
    }

    #[test]
    fn pending_transactions_do_not_count_toward_balance() {
        let ledger = ledger();
        ledger.submit("0", "alice", 50.0, None).unwrap();
        assert_eq!(ledger.balance("alice"), 0.0);
    }

    #[test]
    fn block_at_is_one_based() {
        let ledger = ledger();
        let _ = ledger.mine(None).unwrap();
        assert_eq!(ledger.block_at(1).unwrap().index, 1);
        assert_eq!(ledger.block_at(2).unwrap().proof, 93711);
        assert!(matches!(ledger.block_at(0), Err(LedgerError::BlockNotFound(0))));
        assert!(matches!(ledger.block_at(3), Err(LedgerError::BlockNotFound(3))));
    }

    #[test]
    fn mine_credits_reward_and_links_to_tip() {
        let ledger = ledger();
        let genesis = ledger.latest_block();
        let sealed = ledger.mine(Some("miner")).unwrap();
        assert_eq!(sealed.block.proof, 93711);
        assert_eq!(sealed.block.previous_hash, genesis.hash());
        assert_eq!(
            sealed.block.transactions,
            vec![Transaction::system("miner", MINING_REWARD)]
        );
        assert_eq!(ledger.balance("miner"), MINING_REWARD);
        assert_eq!(ledger.previous_hash(), sealed.block.hash());
        assert_eq!(ledger.next_proof(), 1067);
    }

    #[test]
    fn mine_detects_stale_tip() {
        let ledger = ledger();
        let result = ledger.mine_with(Some("miner"), |last_proof| {
            // Another block lands while the proof is being searched.
            let tip = ledger.latest_block();
            let _ = ledger.create_block(find_proof(last_proof), tip.hash());
            Some(find_proof(last_proof))
        });
        assert!(matches!(result, Err(LedgerError::StaleTip { expected: 1 })));
        assert_eq!(ledger.chain_length(), 2);
        assert!(ledger.pending().is_empty());
    }

    #[test]
    fn cancelled_mining_leaves_ledger_untouched() {
        let ledger = ledger();
        let cancel = AtomicBool::new(true);
        assert!(matches!(
            ledger.mine_cancellable(Some("miner"), &cancel),
            Err(LedgerError::Cancelled)
        ));
        assert_eq!(ledger.chain_length(), 1);
        assert!(ledger.pending().is_empty());
    }

    #[test]
    fn register_node_is_idempotent() {
        let ledger = ledger();
        ledger.register_node("localhost:5000").unwrap();
        ledger.register_node("localhost:5000/").unwrap();
        ledger.register_node(" localhost:5001 ").unwrap();
        assert_eq!(ledger.nodes(), vec!["localhost:5000", "localhost:5001"]);
        assert!(matches!(
            ledger.register_node("http://"),
            Err(LedgerError::MalformedPeer(_))
        ));
    }

    #[test]
    fn peer_scheme_is_stripped_before_trailing_slashes() {
        for bad in ["http://", "https:///", " http:// ", "/", "http://a b"] {
            assert!(
                matches!(normalize_peer(bad), Err(LedgerError::MalformedPeer(_))),
                "{bad:?} should be rejected"
            );
        }
        assert_eq!(normalize_peer("http://node-a:5000/").unwrap(), "http://node-a:5000");
        assert_eq!(normalize_peer("https://node-b//").unwrap(), "https://node-b");
        assert_eq!(normalize_peer("node-c:5000/").unwrap(), "node-c:5000");
    }

    #[test]
    fn register_nodes_is_all_or_nothing() {
        let ledger = ledger();
        assert!(matches!(
            ledger.register_nodes(&["node-a:5000", "http://", "node-b:5000"]),
            Err(LedgerError::MalformedPeer(_))
        ));
        assert!(ledger.nodes().is_empty());

        ledger.register_nodes(&["node-b:5000/", "node-a:5000"]).unwrap();
        assert_eq!(ledger.nodes(), vec!["node-a:5000", "node-b:5000"]);
    }

    #[test]
    #[should_panic(expected = "never empty")]
    fn latest_block_on_empty_chain_panics() {
        let ledger: TestLedger =
            Ledger::without_genesis(Arc::new(MemoryStore::new()), Arc::new(P256Verifier));
        let _ = ledger.latest_block();
    }

    #[test]
    fn corrupting_a_block_invalidates_local_chain() {
        let ledger = ledger();
        let _ = ledger.mine(None).unwrap();
        let _ = ledger.mine(None).unwrap();
        let mut chain = ledger.chain();
        chain[1].previous_hash = "corrupted".into();
        assert!(!ledger.is_valid(&chain));
        ledger.replace_chain_unchecked(chain);
        assert!(!ledger.is_chain_valid());
    }

    #[test]
    fn concurrent_submissions_all_land() {
        let ledger = Arc::new(ledger());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    for j in 0..25 {
                        ledger
                            .submit("0", &format!("user{i}"), j as f64, None)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(ledger.pending().len(), 200);
        let sealed = ledger.mine(None).unwrap();
        assert_eq!(sealed.block.transactions.len(), 200);
    }
}
