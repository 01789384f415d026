use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

pub const DEFAULT_INITIAL_DIFFICULTY: u32 = 4;
pub const DIFFICULTY_ADJUSTMENT_INTERVAL: u64 = 10;
pub const FAST_BLOCK_SECS: i64 = 30;
pub const SLOW_BLOCK_SECS: i64 = 60;

/// Tunables for a chain instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainParams {
    /// Difficulty used for the first block after genesis.
    pub initial_difficulty: u32,
    /// Difficulty is reconsidered at heights that are multiples of this.
    pub adjustment_interval: u64,
    /// Block intervals shorter than this raise difficulty by one.
    pub fast_block_secs: i64,
    /// Block intervals longer than this lower difficulty by one.
    pub slow_block_secs: i64,
    /// Workers used for the nonce search; 1 keeps it on the calling thread.
    /// Configured through `[miner] threads`, never the `[chain]` section.
    #[serde(skip)]
    pub mining_threads: usize,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            initial_difficulty: DEFAULT_INITIAL_DIFFICULTY,
            adjustment_interval: DIFFICULTY_ADJUSTMENT_INTERVAL,
            fast_block_secs: FAST_BLOCK_SECS,
            slow_block_secs: SLOW_BLOCK_SECS,
            mining_threads: 1,
        }
    }
}

impl ChainParams {
    pub fn is_adjustment_height(&self, height: u64) -> bool {
        self.adjustment_interval > 0 && height > 0 && height % self.adjustment_interval == 0
    }
}

/// Difficulty after a block landed `latest_ts - previous_ts` seconds after
/// its predecessor. Only that single interval is considered.
pub fn next_difficulty(current: u32, previous_ts: i64, latest_ts: i64, params: &ChainParams) -> u32 {
    let delta = latest_ts.saturating_sub(previous_ts);
    if delta < params.fast_block_secs {
        current.saturating_add(1)
    } else if delta > params.slow_block_secs && current > 1 {
        current - 1
    } else {
        current
    }
}

/// Source of block timestamps, in UNIX seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// A clock that only moves when told to. Useful for simulations and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
