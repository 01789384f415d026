use crate::crypto::{finalize_hex, update_str, HashHex};
use crate::error::{ChainError, Result};
use crate::miner;
use crate::transaction::{Transaction, TxOutput};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::merkle::transactions_root;

pub const BLOCK_VERSION: u32 = 1;
pub const GENESIS_ADDRESS: &str = "genesis";
pub const GENESIS_REWARD: u64 = 5_000_000_000;
pub const GENESIS_DIFFICULTY: u32 = 1;

/// Previous-hash sentinel carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: u32,
    pub previous_hash: HashHex,
    pub merkle_root: HashHex,
    pub timestamp: i64,
    pub difficulty: u32,
    pub nonce: u64,
    /// Empty until the block is mined (or sealed, for genesis).
    pub hash: HashHex,
    pub height: u64,
}

impl BlockHeader {
    /// Hash of every header field except `hash` itself.
    pub fn calculate_hash(&self) -> HashHex {
        self.hash_with_nonce(self.nonce)
    }

    /// Header hash as it would be with `nonce` substituted. The nonce search
    /// and validation both go through here.
    pub fn hash_with_nonce(&self, nonce: u64) -> HashHex {
        let mut hasher = Sha256::new();
        hasher.update(self.version.to_le_bytes());
        update_str(&mut hasher, &self.previous_hash);
        update_str(&mut hasher, &self.merkle_root);
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.difficulty.to_le_bytes());
        hasher.update(nonce.to_le_bytes());
        hasher.update(self.height.to_le_bytes());
        finalize_hex(hasher)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Assemble an unmined block on top of `previous_hash`.
    pub fn new(transactions: Vec<Transaction>, previous_hash: HashHex, height: u64) -> Self {
        Self::new_at(
            transactions,
            previous_hash,
            height,
            chrono::Utc::now().timestamp(),
        )
    }

    pub fn new_at(
        transactions: Vec<Transaction>,
        previous_hash: HashHex,
        height: u64,
        timestamp: i64,
    ) -> Self {
        let merkle_root = transactions_root(&transactions);

        Block {
            header: BlockHeader {
                version: BLOCK_VERSION,
                previous_hash,
                merkle_root,
                timestamp,
                difficulty: 0,
                nonce: 0,
                hash: String::new(),
                height,
            },
            transactions,
        }
    }

    /// The bootstrap block. It is sealed with nonce 0 rather than mined.
    pub fn new_genesis() -> Self {
        Self::new_genesis_at(chrono::Utc::now().timestamp())
    }

    pub fn new_genesis_at(timestamp: i64) -> Self {
        let coinbase = Transaction::new_at(
            Vec::new(),
            vec![TxOutput::new(GENESIS_REWARD, GENESIS_ADDRESS)],
            timestamp,
        );
        let mut genesis = Block::new_at(
            vec![coinbase],
            GENESIS_PREVIOUS_HASH.to_string(),
            0,
            timestamp,
        );
        genesis.header.difficulty = GENESIS_DIFFICULTY;
        genesis.header.hash = genesis.calculate_hash();
        genesis
    }

    pub fn is_genesis(&self) -> bool {
        self.header.height == 0 && self.header.previous_hash == GENESIS_PREVIOUS_HASH
    }

    pub fn hash(&self) -> &str {
        &self.header.hash
    }

    pub fn calculate_hash(&self) -> HashHex {
        self.header.calculate_hash()
    }

    pub fn calculate_merkle_root(&self) -> HashHex {
        transactions_root(&self.transactions)
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }

    /// Search nonces on the calling thread until the header hash carries
    /// `difficulty` leading zero hex digits. Runs until it succeeds.
    pub fn mine(&mut self, difficulty: u32) {
        self.mine_with_threads(difficulty, 1);
    }

    /// Like [`Block::mine`], spreading the search over `threads` workers when
    /// more than one is requested.
    pub fn mine_with_threads(&mut self, difficulty: u32, threads: usize) {
        self.header.difficulty = difficulty;
        let (nonce, hash) = if threads > 1 {
            miner::mine_parallel(&self.header, difficulty, threads)
        } else {
            miner::mine_sequential(&self.header, difficulty)
        };
        self.header.nonce = nonce;
        self.header.hash = hash;
    }

    /// Lossless byte encoding for persistence.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| ChainError::Serialization(format!("Failed to decode block: {}", e)))
    }
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Block{{hash: {}, height: {}, transactions: {}, timestamp: {}}}",
            self.header.hash,
            self.header.height,
            self.transactions.len(),
            self.header.timestamp
        )
    }
}
