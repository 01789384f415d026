//! PowChain - a single-node proof-of-work ledger
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`transaction`] - Transaction types and structural validation
//! - [`blockchain`] - Blocks, merkle roots, the UTXO index and chain state
//!
//! ## Consensus
//! - [`miner`] - Proof-of-work nonce search
//!
//! ## Cryptography
//! - [`crypto`] - SHA-256 helpers used for ids and hashes
//!
//! ## Coordination & Storage
//! - [`persistence`] - Storage boundary with in-memory and SQLite backends
//! - [`node`] - Drives the chain and mirrors appended blocks to storage
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```
//! use powchain::blockchain::{ChainParams, ChainState};
//! use powchain::transaction::Transaction;
//!
//! let chain = ChainState::with_params(ChainParams {
//!     initial_difficulty: 1,
//!     ..ChainParams::default()
//! });
//! chain
//!     .append_block(vec![Transaction::new_coinbase("miner1", 5_000_000_000)])
//!     .unwrap();
//! assert_eq!(chain.get_height(), 1);
//! assert_eq!(chain.get_balance("miner1"), 5_000_000_000);
//! assert!(chain.validate_chain().is_ok());
//! ```

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Coordination & Storage
// ============================================================================
pub mod node;
pub mod persistence;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

pub use error::{ChainError, Result, TransactionError};
