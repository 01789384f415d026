/// Transaction types for PowChain
use crate::crypto::{finalize_hex, update_str, HashHex};
use crate::error::{ChainError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A claim on a previous output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub tx_id: HashHex,
    pub output_index: u32,
    /// Spender identifier. The UTXO index removes entries from the bucket
    /// keyed by this value.
    pub public_key: String,
    /// Opaque signature material, stored and echoed but never verified here.
    pub signature: String,
}

impl TxInput {
    pub fn new(tx_id: HashHex, output_index: u32, public_key: String) -> Self {
        TxInput {
            tx_id,
            output_index,
            public_key,
            signature: String::new(),
        }
    }
}

/// A value allocation to an address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub address: String,
}

impl TxOutput {
    pub fn new(value: u64, address: impl Into<String>) -> Self {
        TxOutput {
            value,
            address: address.into(),
        }
    }
}

/// An immutable value transfer. A transaction without inputs is a coinbase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: HashHex,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub timestamp: i64,
    pub signature: String,
}

impl Transaction {
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Self::new_at(inputs, outputs, chrono::Utc::now().timestamp())
    }

    /// Build a transaction with an explicit creation time.
    pub fn new_at(inputs: Vec<TxInput>, outputs: Vec<TxOutput>, timestamp: i64) -> Self {
        let mut tx = Transaction {
            id: String::new(),
            inputs,
            outputs,
            timestamp,
            signature: String::new(),
        };
        tx.id = tx.calculate_id();
        tx
    }

    /// Mint `reward` to `address`.
    pub fn new_coinbase(address: impl Into<String>, reward: u64) -> Self {
        Self::new(Vec::new(), vec![TxOutput::new(reward, address)])
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn total_output_value(&self) -> u64 {
        self.outputs
            .iter()
            .fold(0u64, |acc, out| acc.saturating_add(out.value))
    }

    /// Content hash of the transaction. Signature fields are left out of the
    /// preimage so that signing after construction keeps the id stable.
    pub fn calculate_id(&self) -> HashHex {
        let mut hasher = Sha256::new();
        hasher.update((self.inputs.len() as u64).to_le_bytes());
        for input in &self.inputs {
            update_str(&mut hasher, &input.tx_id);
            hasher.update(input.output_index.to_le_bytes());
            update_str(&mut hasher, &input.public_key);
        }
        hasher.update((self.outputs.len() as u64).to_le_bytes());
        for output in &self.outputs {
            hasher.update(output.value.to_le_bytes());
            update_str(&mut hasher, &output.address);
        }
        hasher.update(self.timestamp.to_le_bytes());
        update_str(&mut hasher, "");
        finalize_hex(hasher)
    }

    pub fn attach_signature(&mut self, signature: impl Into<String>) {
        self.signature = signature.into();
    }

    /// Lossless byte encoding for persistence.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| ChainError::Serialization(format!("Failed to decode transaction: {}", e)))
    }
}

impl std::fmt::Display for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Transaction{{id: {}, inputs: {}, outputs: {}, timestamp: {}}}",
            self.id,
            self.inputs.len(),
            self.outputs.len(),
            self.timestamp
        )
    }
}

/// Base units per displayed coin.
pub const UNITS_PER_COIN: u64 = 100_000_000;

/// Render a base-unit amount as coins with eight decimals.
pub fn format_balance(units: u64) -> String {
    format!("{}.{:08}", units / UNITS_PER_COIN, units % UNITS_PER_COIN)
}
