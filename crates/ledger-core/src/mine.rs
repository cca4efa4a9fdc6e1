use crate::pow::verify_proof;
use rayon::prelude::*;
use tracing::info;

/// Searches for a proof in parallel over the rayon pool. `find_first`
/// keeps the result identical to the sequential search: the smallest
/// satisfying candidate.
pub fn find_proof_parallel(last_proof: u64) -> u64 {
    let proof = (0u64..u64::MAX)
        .into_par_iter()
        .find_first(|candidate| verify_proof(*candidate, last_proof).0)
        .expect("proof space exhausted (practically impossible)");

    info!(proof, last_proof, "proof found by parallel search");
    proof
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pow::find_proof;

    #[test]
    fn parallel_search_agrees_with_sequential() {
        assert_eq!(find_proof_parallel(1), 93711);
        assert_eq!(find_proof_parallel(93711), find_proof(93711));
    }
}
