//! Merkle root over transaction ids.

use crate::crypto::{sha256_hex, HashHex};
use crate::transaction::Transaction;

/// Root of an empty leaf sequence.
pub const EMPTY_MERKLE_ROOT: &str = "";

/// Fold `leaves` into a single root.
///
/// Adjacent leaves are paired left to right and each pair is replaced by the
/// hash of the concatenated hex strings. An odd leaf at the end of a level is
/// paired with itself. A single leaf is its own root.
pub fn compute_root(leaves: &[HashHex]) -> HashHex {
    if leaves.is_empty() {
        return EMPTY_MERKLE_ROOT.to_string();
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                let mut combined = String::with_capacity(left.len() + right.len());
                combined.push_str(left);
                combined.push_str(right);
                sha256_hex(combined.as_bytes())
            })
            .collect();
    }
    level.swap_remove(0)
}

/// Root over the ids of `transactions`, in block order.
pub fn transactions_root(transactions: &[Transaction]) -> HashHex {
    let ids: Vec<HashHex> = transactions.iter().map(|tx| tx.id.clone()).collect();
    compute_root(&ids)
}
