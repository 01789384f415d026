use crate::transaction::{Transaction, TxInput, TxOutput};
use std::collections::{BTreeSet, HashMap};

use super::block::Block;

/// Spendable outputs grouped by recipient address.
///
/// Entries are not keyed by the transaction and output index that created
/// them. A spend removes the oldest entry from the spender's bucket, whatever
/// the input claims to reference, and input checks accept every input. Keying
/// entries by `(tx_id, output_index)` would give double-spend protection but
/// changes which outputs a spend consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UtxoIndex {
    buckets: HashMap<String, Vec<TxOutput>>,
}

impl UtxoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold every transaction of `block` into the index, in block order.
    pub fn apply_block(&mut self, block: &Block) {
        for tx in &block.transactions {
            self.apply_transaction(tx);
        }
    }

    pub fn apply_transaction(&mut self, tx: &Transaction) {
        if !tx.is_coinbase() {
            for input in &tx.inputs {
                self.remove_one(&input.public_key);
            }
        }
        for output in &tx.outputs {
            self.buckets
                .entry(output.address.clone())
                .or_default()
                .push(output.clone());
        }
    }

    fn remove_one(&mut self, address: &str) {
        if let Some(bucket) = self.buckets.get_mut(address) {
            if !bucket.is_empty() {
                bucket.remove(0);
            }
            if bucket.is_empty() {
                self.buckets.remove(address);
            }
        }
    }

    /// Every input is accepted; see the type-level docs.
    pub fn accepts_input(&self, _input: &TxInput) -> bool {
        true
    }

    pub fn balance(&self, address: &str) -> u64 {
        self.bucket(address)
            .iter()
            .fold(0u64, |acc, out| acc.saturating_add(out.value))
    }

    pub fn bucket(&self, address: &str) -> &[TxOutput] {
        self.buckets.get(address).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Copy of the outputs indexed under `address`.
    pub fn outputs(&self, address: &str) -> Vec<TxOutput> {
        self.bucket(address).to_vec()
    }

    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    /// Number of indexed outputs across all addresses.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Addresses whose bucket `block` can change: spenders and recipients.
pub fn affected_addresses(block: &Block) -> BTreeSet<String> {
    let mut addresses = BTreeSet::new();
    for tx in &block.transactions {
        if !tx.is_coinbase() {
            addresses.extend(tx.inputs.iter().map(|i| i.public_key.clone()));
        }
        addresses.extend(tx.outputs.iter().map(|o| o.address.clone()));
    }
    addresses
}
