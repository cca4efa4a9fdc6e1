use crate::block::Block;
use crate::pow::is_valid_proof;
use crate::wallet::SignatureVerifier;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// First rule a chain breaks. `index` is the 1-based position of the
/// offending block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainFault {
    #[error("chain is empty")]
    Empty,
    #[error("block {index}: index does not follow its predecessor")]
    IndexGap { index: usize },
    #[error("block {index}: previous_hash does not match predecessor")]
    BrokenLink { index: usize },
    #[error("block {index}: proof does not satisfy the difficulty predicate")]
    BadProof { index: usize },
    #[error("block {index}: timestamp is unparsable")]
    BadTimestamp { index: usize },
    #[error("block {index}: timestamp does not increase")]
    TimestampRegression { index: usize },
    #[error("block {index}: transaction {tx} carries an invalid signature")]
    BadSignature { index: usize, tx: usize },
}

pub fn parse_timestamp(timestamp: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(timestamp)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Walks `chain` from the second block on. A single block is trivially
/// valid; an empty chain is not.
pub fn check_chain<V>(chain: &[Block], verifier: &V) -> Result<(), ChainFault>
where
    V: SignatureVerifier + ?Sized,
{
    let Some(first) = chain.first() else {
        return Err(ChainFault::Empty);
    };

    let mut previous = first;
    for (offset, block) in chain.iter().enumerate().skip(1) {
        let index = offset + 1;

        if block.index != previous.index + 1 {
            return Err(ChainFault::IndexGap { index });
        }
        if block.previous_hash != previous.hash() {
            return Err(ChainFault::BrokenLink { index });
        }
        if !is_valid_proof(block.proof, previous.proof) {
            return Err(ChainFault::BadProof { index });
        }

        let (Some(prev_time), Some(time)) = (
            parse_timestamp(&previous.timestamp),
            parse_timestamp(&block.timestamp),
        ) else {
            return Err(ChainFault::BadTimestamp { index });
        };
        if time <= prev_time {
            return Err(ChainFault::TimestampRegression { index });
        }

        for (tx_index, tx) in block.transactions.iter().enumerate() {
            if tx.is_system() {
                continue;
            }
            let signed = tx
                .signature
                .as_deref()
                .is_some_and(|sig| verifier.verify(&tx.sender, &tx.signing_payload(), sig));
            if !signed {
                return Err(ChainFault::BadSignature { index, tx: tx_index });
            }
        }

        previous = block;
    }
    Ok(())
}

pub fn is_valid<V>(chain: &[Block], verifier: &V) -> bool
where
    V: SignatureVerifier + ?Sized,
{
    check_chain(chain, verifier).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;
    use crate::wallet::{P256Verifier, Wallet};

    const T1: &str = "2025-07-06T12:00:00Z";
    const T2: &str = "2025-07-06T13:00:00Z";
    const T3: &str = "2025-07-06T14:00:00Z";

    fn genesis() -> Block {
        Block::seal(1, T1, vec![], 1, "0")
    }

    fn two_block_chain() -> Vec<Block> {
        let first = genesis();
        let second = Block::seal(2, T2, vec![], 93711, first.hash());
        vec![first, second]
    }

    #[test]
    fn mined_two_block_chain_is_valid() {
        assert_eq!(check_chain(&two_block_chain(), &P256Verifier), Ok(()));
    }

    #[test]
    fn corrupted_previous_hash_is_rejected() {
        let mut chain = two_block_chain();
        chain[1].previous_hash = "corrupted".into();
        assert_eq!(
            check_chain(&chain, &P256Verifier),
            Err(ChainFault::BrokenLink { index: 2 })
        );
    }

    #[test]
    fn empty_chain_fails_closed_and_single_block_passes() {
        assert_eq!(check_chain(&[], &P256Verifier), Err(ChainFault::Empty));
        assert!(is_valid(&[genesis()], &P256Verifier));
        // Even a nonsensical lone block passes: there is nothing to link it to.
        assert!(is_valid(&[Block::seal(9, "junk", vec![], 0, "x")], &P256Verifier));
    }

    #[test]
    fn bad_proof_is_rejected() {
        let mut chain = two_block_chain();
        chain[1].proof = 93710;
        assert_eq!(
            check_chain(&chain, &P256Verifier),
            Err(ChainFault::BadProof { index: 2 })
        );
    }

    #[test]
    fn index_gap_is_rejected() {
        let first = genesis();
        let second = Block::seal(3, T2, vec![], 93711, first.hash());
        assert_eq!(
            check_chain(&[first, second], &P256Verifier),
            Err(ChainFault::IndexGap { index: 2 })
        );
    }

    #[test]
    fn timestamps_must_increase() {
        let first = genesis();
        let same = Block::seal(2, T1, vec![], 93711, first.hash());
        assert_eq!(
            check_chain(&[first.clone(), same], &P256Verifier),
            Err(ChainFault::TimestampRegression { index: 2 })
        );
        let junk = Block::seal(2, "not a time", vec![], 93711, first.hash());
        assert_eq!(
            check_chain(&[first, junk], &P256Verifier),
            Err(ChainFault::BadTimestamp { index: 2 })
        );
    }

    #[test]
    fn mixed_timestamp_precision_compares_by_instant() {
        let first = genesis();
        let second = Block::seal(2, "2025-07-06T12:00:00.000001Z", vec![], 93711, first.hash());
        assert!(is_valid(&[first, second], &P256Verifier));
    }

    #[test]
    fn signatures_are_checked_except_for_system_sender() {
        let wallet = Wallet::generate();
        let signed = Transaction::new(
            wallet.address(),
            "bob",
            20.0,
            Some(wallet.sign_transfer("bob", 20.0)),
        );
        let first = genesis();
        let second = Block::seal(
            2,
            T2,
            vec![Transaction::system(wallet.address(), 50.0), signed.clone()],
            93711,
            first.hash(),
        );
        let good = vec![first.clone(), second.clone()];
        assert!(is_valid(&good, &P256Verifier));

        let mut forged = signed.clone();
        forged.amount = 2000.0;
        let bad_block = Block::seal(2, T2, vec![forged], 93711, first.hash());
        assert_eq!(
            check_chain(&[first.clone(), bad_block], &P256Verifier),
            Err(ChainFault::BadSignature { index: 2, tx: 0 })
        );

        let mut unsigned = signed;
        unsigned.signature = None;
        let third = Block::seal(3, T3, vec![unsigned], 1067, second.hash());
        assert_eq!(
            check_chain(&[first, second, third], &P256Verifier),
            Err(ChainFault::BadSignature { index: 3, tx: 0 })
        );
    }
}
