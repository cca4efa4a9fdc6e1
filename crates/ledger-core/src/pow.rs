use crate::constants::POW_PREFIX;
use crate::hashing::sha256_hex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// How many candidates the cancellable search tries between flag checks.
const CANCEL_POLL_INTERVAL: u64 = 4096;

/// Evaluate the difficulty predicate for `proof` against the prior proof.
/// Returns whether it holds together with the digest that was tested.
pub fn verify_proof(proof: u64, last_proof: u64) -> (bool, String) {
    let digest = sha256_hex(format!("{proof}{last_proof}"));
    (digest.starts_with(POW_PREFIX), digest)
}

pub fn is_valid_proof(proof: u64, last_proof: u64) -> bool {
    verify_proof(proof, last_proof).0
}

/// Sequential search from 0; returns the smallest proof satisfying the
/// predicate for `last_proof`. Blocks until found.
pub fn find_proof(last_proof: u64) -> u64 {
    let mut proof = 0u64;
    loop {
        let (valid, digest) = verify_proof(proof, last_proof);
        if valid {
            debug!(proof, last_proof, %digest, "proof found");
            return proof;
        }
        proof += 1;
    }
}

/// Like [`find_proof`], but gives up and returns `None` once `cancel` is set.
pub fn find_proof_cancellable(last_proof: u64, cancel: &AtomicBool) -> Option<u64> {
    let mut proof = 0u64;
    loop {
        if proof % CANCEL_POLL_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
            debug!(last_proof, tried = proof, "proof search cancelled");
            return None;
        }
        let (valid, digest) = verify_proof(proof, last_proof);
        if valid {
            debug!(proof, last_proof, %digest, "proof found");
            return Some(proof);
        }
        proof += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_proof_after_genesis() {
        let proof = find_proof(1);
        assert_eq!(proof, 93711);
        let (valid, digest) = verify_proof(proof, 1);
        assert!(valid);
        assert!(digest.starts_with("0000e6b8"));
    }

    #[test]
    fn find_proof_returns_smallest() {
        let proof = find_proof(93711);
        assert_eq!(proof, 1067);
        assert!((0..proof).all(|p| !is_valid_proof(p, 93711)));
    }

    #[test]
    fn verify_proof_rejects_non_matching_candidate() {
        let (valid, digest) = verify_proof(93710, 1);
        assert!(!valid);
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn predicate_is_order_sensitive() {
        // "93711" + "1" hashes differently from "1" + "93711".
        assert!(is_valid_proof(93711, 1));
        assert!(!is_valid_proof(1, 93711));
    }

    #[test]
    fn cancellable_search_matches_sequential() {
        let cancel = AtomicBool::new(false);
        assert_eq!(find_proof_cancellable(1, &cancel), Some(93711));
    }

    #[test]
    fn cancelled_search_returns_none() {
        let cancel = AtomicBool::new(true);
        assert_eq!(find_proof_cancellable(1, &cancel), None);
    }
}
