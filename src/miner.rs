//! Proof-of-work nonce search.
//!
//! Both searches are unbounded: they return only once a nonce whose header
//! hash carries the required number of leading zero hex digits is found.

use crate::blockchain::BlockHeader;
use crate::crypto::HashHex;
use rayon::prelude::*;
use tracing::{debug, warn};

/// Nonces handed to each worker per parallel round.
const NONCES_PER_WORKER: u64 = 4_096;

/// True when the first `difficulty` hex digits of `hash` are all `'0'`.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let digits = difficulty as usize;
    hash.len() >= digits && hash.bytes().take(digits).all(|b| b == b'0')
}

/// Walk the nonce stream one step at a time starting after `header.nonce`.
pub fn mine_sequential(header: &BlockHeader, difficulty: u32) -> (u64, HashHex) {
    let mut nonce = header.nonce;
    loop {
        nonce = nonce.wrapping_add(1);
        let hash = header.hash_with_nonce(nonce);
        if meets_difficulty(&hash, difficulty) {
            debug!(height = header.height, nonce, %hash, "block mined");
            return (nonce, hash);
        }
    }
}

/// Scan successive nonce batches on a dedicated pool of `threads` workers.
/// Any winning nonce in a batch is accepted, not necessarily the smallest.
pub fn mine_parallel(header: &BlockHeader, difficulty: u32, threads: usize) -> (u64, HashHex) {
    let pool = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool,
        Err(e) => {
            warn!("Failed to build mining pool ({}); mining on the calling thread", e);
            return mine_sequential(header, difficulty);
        }
    };

    let batch = NONCES_PER_WORKER.saturating_mul(threads as u64).max(1);
    let mut start = header.nonce.wrapping_add(1);
    loop {
        let end = start.saturating_add(batch);
        let found = pool.install(|| {
            (start..end).into_par_iter().find_map_any(|nonce| {
                let hash = header.hash_with_nonce(nonce);
                meets_difficulty(&hash, difficulty).then_some((nonce, hash))
            })
        });
        if let Some((nonce, hash)) = found {
            debug!(height = header.height, nonce, %hash, threads, "block mined");
            return (nonce, hash);
        }
        start = if end == u64::MAX { 0 } else { end };
    }
}
