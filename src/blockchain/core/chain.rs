use crate::crypto::HashHex;
use crate::error::{ChainError, Result};
use crate::transaction::{Transaction, TxInput, TxOutput};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

use super::block::Block;
use super::params::{next_difficulty, ChainParams, Clock, SystemClock};
use super::state::UtxoIndex;
use super::validation::{validate_blocks, validate_inputs};

/// Height, difficulty and tip hash taken under one read lock.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChainInfo {
    pub height: u64,
    pub difficulty: u32,
    pub latest_hash: HashHex,
}

struct ChainInner {
    /// Never empty: index 0 is genesis.
    blocks: Vec<Block>,
    difficulty: u32,
    utxo: UtxoIndex,
}

impl ChainInner {
    fn tip(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    /// Apply the adjustment policy once `blocks` ends at an adjustment height.
    fn adjust_difficulty(&mut self, params: &ChainParams) {
        let n = self.blocks.len();
        if n < 2 || !params.is_adjustment_height(self.blocks[n - 1].header.height) {
            return;
        }
        let previous_ts = self.blocks[n - 2].header.timestamp;
        let latest_ts = self.blocks[n - 1].header.timestamp;
        let adjusted = next_difficulty(self.difficulty, previous_ts, latest_ts, params);
        if adjusted != self.difficulty {
            info!(
                height = self.blocks[n - 1].header.height,
                from = self.difficulty,
                to = adjusted,
                "difficulty adjusted"
            );
        }
        self.difficulty = adjusted;
    }
}

/// The ledger: blocks, UTXO index and difficulty behind one reader/writer
/// lock. Reads share the lock; `append_block` holds it exclusively for the
/// whole mine-validate-apply sequence, so readers wait out a nonce search.
pub struct ChainState {
    inner: RwLock<ChainInner>,
    params: ChainParams,
    clock: Arc<dyn Clock>,
}

impl ChainState {
    pub fn new() -> Self {
        Self::with_params(ChainParams::default())
    }

    pub fn with_params(params: ChainParams) -> Self {
        Self::with_clock(params, Arc::new(SystemClock))
    }

    /// Start a fresh chain whose genesis and candidate blocks are stamped by
    /// `clock`.
    pub fn with_clock(params: ChainParams, clock: Arc<dyn Clock>) -> Self {
        let genesis = Block::new_genesis_at(clock.now());
        let mut utxo = UtxoIndex::new();
        utxo.apply_block(&genesis);

        ChainState {
            inner: RwLock::new(ChainInner {
                blocks: vec![genesis],
                difficulty: params.initial_difficulty,
                utxo,
            }),
            params,
            clock,
        }
    }

    /// Rebuild a chain from previously appended blocks. The blocks are fully
    /// validated and replayed so the UTXO index and difficulty come out as
    /// they were when the last block was appended.
    pub fn from_blocks(blocks: Vec<Block>, params: ChainParams, clock: Arc<dyn Clock>) -> Result<Self> {
        validate_blocks(&blocks)?;

        let mut inner = ChainInner {
            blocks: Vec::with_capacity(blocks.len()),
            difficulty: params.initial_difficulty,
            utxo: UtxoIndex::new(),
        };
        for block in blocks {
            validate_inputs(&block, &inner.utxo)?;
            inner.utxo.apply_block(&block);
            inner.blocks.push(block);
            inner.adjust_difficulty(&params);
        }
        debug!(height = inner.tip().header.height, "chain reloaded");

        Ok(ChainState {
            inner: RwLock::new(inner),
            params,
            clock,
        })
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Mine `transactions` into a block on the current tip and append it.
    ///
    /// On any validation failure the candidate is discarded and the chain is
    /// left exactly as it was.
    pub fn append_block(&self, transactions: Vec<Transaction>) -> Result<Block> {
        let mut inner = self.inner.write();

        let (previous_hash, height) = {
            let tip = inner.tip();
            (tip.header.hash.clone(), tip.header.height + 1)
        };
        let mut block = Block::new_at(transactions, previous_hash, height, self.clock.now());
        block.mine_with_threads(inner.difficulty, self.params.mining_threads);

        block.validate(Some(inner.tip()))?;
        validate_inputs(&block, &inner.utxo)?;

        inner.utxo.apply_block(&block);
        inner.blocks.push(block.clone());
        inner.adjust_difficulty(&self.params);

        debug!(
            height = block.header.height,
            hash = %block.header.hash,
            transactions = block.transactions.len(),
            "block appended"
        );
        Ok(block)
    }

    pub fn get_block_by_height(&self, height: u64) -> Result<Block> {
        let inner = self.inner.read();
        usize::try_from(height)
            .ok()
            .and_then(|h| inner.blocks.get(h))
            .cloned()
            .ok_or_else(|| ChainError::BlockNotFound(format!("height {}", height)))
    }

    pub fn get_block_by_hash(&self, hash: &str) -> Result<Block> {
        let inner = self.inner.read();
        inner
            .blocks
            .iter()
            .find(|b| b.header.hash == hash)
            .cloned()
            .ok_or_else(|| ChainError::BlockNotFound(hash.to_string()))
    }

    pub fn get_latest_block(&self) -> Block {
        self.inner.read().tip().clone()
    }

    pub fn get_height(&self) -> u64 {
        self.inner.read().tip().header.height
    }

    pub fn get_difficulty(&self) -> u32 {
        self.inner.read().difficulty
    }

    pub fn get_all_blocks(&self) -> Vec<Block> {
        self.inner.read().blocks.clone()
    }

    pub fn info(&self) -> ChainInfo {
        let inner = self.inner.read();
        ChainInfo {
            height: inner.tip().header.height,
            difficulty: inner.difficulty,
            latest_hash: inner.tip().header.hash.clone(),
        }
    }

    pub fn get_balance(&self, address: &str) -> u64 {
        self.inner.read().utxo.balance(address)
    }

    pub fn find_utxo(&self, address: &str) -> Vec<TxOutput> {
        self.inner.read().utxo.outputs(address)
    }

    /// Linear scan over every block's transactions.
    pub fn get_transaction_by_id(&self, id: &str) -> Result<Transaction> {
        let inner = self.inner.read();
        inner
            .blocks
            .iter()
            .flat_map(|b| b.transactions.iter())
            .find(|tx| tx.id == id)
            .cloned()
            .ok_or_else(|| ChainError::TransactionNotFound(id.to_string()))
    }

    /// Build an unsigned spend of `amount` from `from` to `to`.
    ///
    /// Indexed outputs of `from` are taken in order until they cover
    /// `amount`; any excess comes back to `from` as a change output. The
    /// index itself is untouched until the transaction lands in a block.
    pub fn create_transaction(&self, from: &str, to: &str, amount: u64) -> Result<Transaction> {
        if amount == 0 {
            return Err(ChainError::InvalidAmount);
        }

        let inner = self.inner.read();
        let mut total: u64 = 0;
        let mut inputs = Vec::new();
        for out in inner.utxo.bucket(from) {
            if total >= amount {
                break;
            }
            inputs.push(TxInput::new(String::new(), 0, from.to_string()));
            total = total.saturating_add(out.value);
        }

        if total < amount {
            return Err(ChainError::InsufficientFunds {
                address: from.to_string(),
                available: total,
                requested: amount,
            });
        }

        let mut outputs = vec![TxOutput::new(amount, to)];
        if total > amount {
            outputs.push(TxOutput::new(total - amount, from));
        }
        Ok(Transaction::new_at(inputs, outputs, self.clock.now()))
    }

    /// Validate every block from genesis to tip.
    pub fn validate_chain(&self) -> Result<()> {
        validate_blocks(&self.inner.read().blocks)
    }
}

impl Default for ChainState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChainState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let inner = self.inner.read();
        write!(
            f,
            "Blockchain{{height: {}, difficulty: {}, blocks: {}}}",
            inner.tip().header.height,
            inner.difficulty,
            inner.blocks.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::core::block::{GENESIS_ADDRESS, GENESIS_REWARD};
    use crate::blockchain::core::params::ManualClock;

    fn easy_chain() -> ChainState {
        ChainState::with_params(ChainParams {
            initial_difficulty: 1,
            ..ChainParams::default()
        })
    }

    #[test]
    fn test_new_chain_has_genesis() {
        let chain = easy_chain();
        assert_eq!(chain.get_height(), 0);
        assert_eq!(chain.get_difficulty(), 1);
        assert!(chain.get_latest_block().is_genesis());
        assert_eq!(chain.get_balance(GENESIS_ADDRESS), GENESIS_REWARD);
        assert!(chain.validate_chain().is_ok());
    }

    #[test]
    fn test_default_difficulty() {
        assert_eq!(ChainState::new().get_difficulty(), 4);
    }

    #[test]
    fn test_failed_append_leaves_state_unchanged() {
        let chain = easy_chain();
        let before = chain.get_all_blocks();
        let err = chain
            .append_block(vec![
                Transaction::new_coinbase("a", 1),
                Transaction::new_coinbase("b", 1),
            ])
            .unwrap_err();
        assert_eq!(err, ChainError::MultipleCoinbase(2));
        assert_eq!(chain.get_all_blocks(), before);
        assert_eq!(chain.get_balance("a"), 0);
        assert_eq!(chain.get_height(), 0);
    }

    #[test]
    fn test_tampered_block_fails_at_its_index() {
        let chain = easy_chain();
        for _ in 0..3 {
            chain.append_block(vec![Transaction::new_coinbase("m", 10)]).unwrap();
        }
        chain.inner.write().blocks[2].header.height = 7;
        let err = chain.validate_chain().unwrap_err();
        assert_eq!(err.block_index(), Some(2));
    }

    #[test]
    fn test_create_transaction_is_greedy_with_change() {
        let clock = Arc::new(ManualClock::new(1_000));
        let chain = ChainState::with_clock(
            ChainParams {
                initial_difficulty: 1,
                ..ChainParams::default()
            },
            clock,
        );
        chain.append_block(vec![Transaction::new_coinbase("alice", 30)]).unwrap();
        chain.append_block(vec![Transaction::new_coinbase("alice", 50)]).unwrap();
        chain.append_block(vec![Transaction::new_coinbase("alice", 70)]).unwrap();

        let tx = chain.create_transaction("alice", "bob", 60).unwrap();
        assert_eq!(tx.inputs.len(), 2);
        assert!(tx.inputs.iter().all(|i| i.public_key == "alice"));
        assert_eq!(
            tx.outputs,
            vec![TxOutput::new(60, "bob"), TxOutput::new(20, "alice")]
        );
        assert_eq!(tx.timestamp, 1_000);
        assert!(tx.validate().is_ok());
        assert_eq!(chain.get_balance("alice"), 150);
    }

    #[test]
    fn test_create_transaction_exact_amount_has_no_change() {
        let chain = easy_chain();
        let tx = chain
            .create_transaction(GENESIS_ADDRESS, "bob", GENESIS_REWARD)
            .unwrap();
        assert_eq!(tx.outputs, vec![TxOutput::new(GENESIS_REWARD, "bob")]);
    }

    #[test]
    fn test_create_transaction_rejects_zero() {
        let chain = easy_chain();
        assert_eq!(
            chain.create_transaction(GENESIS_ADDRESS, "bob", 0),
            Err(ChainError::InvalidAmount)
        );
    }

    #[test]
    fn test_display() {
        let chain = easy_chain();
        assert_eq!(chain.to_string(), "Blockchain{height: 0, difficulty: 1, blocks: 1}");
    }
}
