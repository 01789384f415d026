use crate::error::{ChainError, Result};
use crate::miner::meets_difficulty;

use super::block::{Block, GENESIS_PREVIOUS_HASH};
use super::state::UtxoIndex;

impl Block {
    /// Check this block on its own and, when `previous` is given, against its
    /// predecessor. Returns the first rule that fails.
    pub fn validate(&self, previous: Option<&Block>) -> Result<()> {
        let computed = self.calculate_hash();
        if self.header.hash != computed {
            return Err(ChainError::HashMismatch {
                stored: self.header.hash.clone(),
                computed,
            });
        }

        if let Some(previous) = previous {
            if self.header.previous_hash != previous.header.hash {
                return Err(ChainError::ChainLinkage(format!(
                    "previous hash {} does not match predecessor hash {}",
                    self.header.previous_hash, previous.header.hash
                )));
            }

            if previous.header.height.checked_add(1) != Some(self.header.height) {
                return Err(ChainError::ChainLinkage(format!(
                    "height {} does not follow predecessor height {}",
                    self.header.height, previous.header.height
                )));
            }

            if !meets_difficulty(&self.header.hash, self.header.difficulty) {
                return Err(ChainError::InsufficientWork {
                    hash: self.header.hash.clone(),
                    difficulty: self.header.difficulty,
                });
            }
        }

        let merkle_root = self.calculate_merkle_root();
        if self.header.merkle_root != merkle_root {
            return Err(ChainError::MerkleMismatch {
                stored: self.header.merkle_root.clone(),
                computed: merkle_root,
            });
        }

        let first = self.transactions.first().ok_or(ChainError::EmptyBlock)?;
        if !first.is_coinbase() {
            return Err(ChainError::MissingCoinbase);
        }

        let mut coinbase_count = 0;
        for tx in &self.transactions {
            if tx.is_coinbase() {
                coinbase_count += 1;
            }
            tx.validate().map_err(|source| ChainError::TransactionInvalid {
                tx_id: tx.id.clone(),
                source,
            })?;
        }

        if coinbase_count != 1 {
            return Err(ChainError::MultipleCoinbase(coinbase_count));
        }

        Ok(())
    }
}

/// Check every spending input in `block` against the UTXO index.
pub fn validate_inputs(block: &Block, utxo: &UtxoIndex) -> Result<()> {
    for tx in block.transactions.iter().filter(|tx| !tx.is_coinbase()) {
        if tx.inputs.iter().any(|input| !utxo.accepts_input(input)) {
            return Err(ChainError::InvalidInput(tx.id.clone()));
        }
    }
    Ok(())
}

/// Validate a whole chain: genesis on its own, then every block against its
/// predecessor. Stops at the first failure and reports its index.
pub fn validate_blocks(blocks: &[Block]) -> Result<()> {
    let at = |index: usize| move |source: ChainError| ChainError::InvalidBlockAt {
        index,
        source: Box::new(source),
    };

    let genesis = blocks
        .first()
        .ok_or_else(|| ChainError::BlockNotFound("genesis".to_string()))?;
    genesis.validate(None).map_err(at(0))?;
    if genesis.header.height != 0 || genesis.header.previous_hash != GENESIS_PREVIOUS_HASH {
        return Err(at(0)(ChainError::ChainLinkage(format!(
            "genesis must have height 0 and the sentinel previous hash, found height {}",
            genesis.header.height
        ))));
    }

    for (index, pair) in blocks.windows(2).enumerate() {
        pair[1].validate(Some(&pair[0])).map_err(at(index + 1))?;
    }
    Ok(())
}
