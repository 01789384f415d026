//! Error types for PowChain

use thiserror::Error;

/// Structural problems with a single transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("transaction id mismatch: stored {stored}, computed {computed}")]
    IdentityMismatch { stored: String, computed: String },
    #[error("transaction must have at least one output")]
    MissingOutputs,
    #[error("transaction must have at least one input")]
    MissingInputs,
    #[error("output {index} has a non-positive value")]
    NonPositiveOutputValue { index: usize },
    #[error("coinbase transaction must have exactly one output, found {0}")]
    WrongCoinbaseOutputCount(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("block hash mismatch: stored {stored}, computed {computed}")]
    HashMismatch { stored: String, computed: String },
    #[error("chain linkage error: {0}")]
    ChainLinkage(String),
    #[error("merkle root mismatch: stored {stored}, computed {computed}")]
    MerkleMismatch { stored: String, computed: String },
    #[error("block must contain at least one transaction")]
    EmptyBlock,
    #[error("first transaction in a block must be a coinbase")]
    MissingCoinbase,
    #[error("block must contain exactly one coinbase transaction, found {0}")]
    MultipleCoinbase(usize),
    #[error("block hash {hash} does not meet difficulty {difficulty}")]
    InsufficientWork { hash: String, difficulty: u32 },
    #[error("invalid transaction {tx_id}: {source}")]
    TransactionInvalid {
        tx_id: String,
        #[source]
        source: TransactionError,
    },
    #[error("invalid input in transaction {0}")]
    InvalidInput(String),
    #[error("insufficient funds: {address} holds {available}, needs {requested}")]
    InsufficientFunds {
        address: String,
        available: u64,
        requested: u64,
    },
    #[error("amount must be greater than zero")]
    InvalidAmount,
    #[error("block not found: {0}")]
    BlockNotFound(String),
    #[error("transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("block {index} validation failed: {source}")]
    InvalidBlockAt {
        index: usize,
        #[source]
        source: Box<ChainError>,
    },
    #[error("database error: {0}")]
    Database(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl ChainError {
    /// Position reported by `validate_chain`, if this error came from it.
    pub fn block_index(&self) -> Option<usize> {
        match self {
            ChainError::InvalidBlockAt { index, .. } => Some(*index),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for ChainError {
    fn from(err: rusqlite::Error) -> Self {
        ChainError::Database(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
