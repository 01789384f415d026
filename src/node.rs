use crate::blockchain::{affected_addresses, Block, ChainState, Clock, SystemClock};
use crate::config::{Backend, Config, DatabaseConfig};
use crate::error::Result;
use crate::persistence::{Database, InMemoryPersistence, Persistence, DIFFICULTY_KEY};
use crate::transaction::Transaction;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

/// Drives a [`ChainState`] and mirrors every appended block to storage.
///
/// Storage is best effort: the in-memory chain is authoritative and write
/// failures are logged rather than returned.
pub struct Node {
    config: Config,
    persistence: Box<dyn Persistence>,
    chain: Arc<ChainState>,
    /// Held across append and mirror so stored UTXO buckets and difficulty
    /// are written in block order.
    append_lock: Mutex<()>,
}

fn open_persistence(database: &DatabaseConfig) -> Box<dyn Persistence> {
    match database.backend {
        Backend::Memory => Box::new(InMemoryPersistence::new()),
        Backend::Sqlite => match Database::open(&database.path) {
            Ok(db) => Box::new(db),
            Err(e) => {
                warn!(
                    "Failed to open DB at {}: {}. Falling back to in-memory persistence.",
                    database.path, e
                );
                Box::new(InMemoryPersistence::new())
            }
        },
    }
}

impl Node {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let persistence = open_persistence(&config.database);
        Self::with_persistence(config, persistence, clock)
    }

    /// Reload the chain stored in `persistence`, or start a fresh one when
    /// it holds no blocks. A store that cannot be read is an error; it is
    /// never overwritten with a new genesis.
    pub fn with_persistence(
        config: Config,
        persistence: Box<dyn Persistence>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let params = config.chain_params();
        let stored = persistence.load_blocks()?;

        let fresh = stored.is_empty();
        let chain = if fresh {
            ChainState::with_clock(params, clock)
        } else {
            ChainState::from_blocks(stored, params, clock)?
        };

        let node = Node {
            config,
            persistence,
            chain: Arc::new(chain),
            append_lock: Mutex::new(()),
        };

        if fresh {
            let genesis = node.chain.get_latest_block();
            if let Err(e) = node.persist(&genesis) {
                warn!("Failed to persist genesis block: {}", e);
            }
            info!(hash = %genesis.header.hash, "created new chain");
        } else {
            node.check_stored_difficulty();
            info!(height = node.chain.get_height(), "reloaded chain from persistence");
        }

        Ok(node)
    }

    pub fn chain(&self) -> Arc<ChainState> {
        Arc::clone(&self.chain)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn persistence(&self) -> &dyn Persistence {
        self.persistence.as_ref()
    }

    /// Append a block holding only a coinbase paying `beneficiary` the
    /// configured reward.
    pub fn mine_block(&self, beneficiary: &str) -> Result<Block> {
        self.append(vec![self.coinbase(beneficiary)])
    }

    /// Move `amount` from `from` to `to` in a new block mined by
    /// `beneficiary`.
    pub fn send(&self, from: &str, to: &str, amount: u64, beneficiary: &str) -> Result<Block> {
        let tx = self.chain.create_transaction(from, to, amount)?;
        self.append(vec![self.coinbase(beneficiary), tx])
    }

    fn coinbase(&self, beneficiary: &str) -> Transaction {
        Transaction::new_coinbase(beneficiary, self.config.miner.reward)
    }

    fn append(&self, transactions: Vec<Transaction>) -> Result<Block> {
        let _guard = self.append_lock.lock();
        let block = self.chain.append_block(transactions)?;
        if let Err(e) = self.persist(&block) {
            warn!(height = block.header.height, "Failed to persist block: {}", e);
        }
        Ok(block)
    }

    fn persist(&self, block: &Block) -> Result<()> {
        self.persistence.save_block(block)?;
        for address in affected_addresses(block) {
            self.persistence
                .save_utxo(&address, &self.chain.find_utxo(&address))?;
        }
        let difficulty = self.chain.get_difficulty().to_string();
        self.persistence
            .save_metadata(DIFFICULTY_KEY, difficulty.as_bytes())?;
        Ok(())
    }

    fn check_stored_difficulty(&self) {
        let stored = match self.persistence.get_metadata(DIFFICULTY_KEY) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return,
            Err(e) => {
                warn!("Failed to read stored difficulty: {}", e);
                return;
            }
        };
        let replayed = self.chain.get_difficulty();
        if String::from_utf8_lossy(&stored) != replayed.to_string() {
            warn!(
                stored = %String::from_utf8_lossy(&stored),
                replayed,
                "stored difficulty disagrees with replayed chain"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{ChainParams, GENESIS_ADDRESS, GENESIS_REWARD};
    use crate::error::ChainError;
    use crate::transaction::TxOutput;

    fn memory_config() -> Config {
        let mut config = Config {
            chain: ChainParams {
                initial_difficulty: 1,
                ..ChainParams::default()
            },
            ..Config::default()
        };
        config.database.backend = Backend::Memory;
        config.miner.reward = 50;
        config
    }

    /// Accepts nothing; every write fails.
    struct BrokenStore;

    impl Persistence for BrokenStore {
        fn save_block(&self, _: &Block) -> Result<()> {
            Err(ChainError::Database("disk full".to_string()))
        }
        fn get_block(&self, hash: &str) -> Result<Block> {
            Err(ChainError::BlockNotFound(hash.to_string()))
        }
        fn get_block_by_height(&self, height: u64) -> Result<Block> {
            Err(ChainError::BlockNotFound(height.to_string()))
        }
        fn load_blocks(&self) -> Result<Vec<Block>> {
            Ok(Vec::new())
        }
        fn save_transaction(&self, _: &Transaction) -> Result<()> {
            Err(ChainError::Database("disk full".to_string()))
        }
        fn get_transaction(&self, id: &str) -> Result<Transaction> {
            Err(ChainError::TransactionNotFound(id.to_string()))
        }
        fn save_utxo(&self, _: &str, _: &[TxOutput]) -> Result<()> {
            Err(ChainError::Database("disk full".to_string()))
        }
        fn get_utxo(&self, _: &str) -> Result<Vec<TxOutput>> {
            Ok(Vec::new())
        }
        fn save_metadata(&self, _: &str, _: &[u8]) -> Result<()> {
            Err(ChainError::Database("disk full".to_string()))
        }
        fn get_metadata(&self, _: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }
    }

    #[test]
    fn test_new_node_persists_genesis() {
        let node = Node::new(memory_config()).unwrap();
        let genesis = node.chain().get_latest_block();
        assert_eq!(node.persistence().get_block(&genesis.header.hash).unwrap(), genesis);
        assert_eq!(
            node.persistence().get_utxo(GENESIS_ADDRESS).unwrap(),
            vec![TxOutput::new(GENESIS_REWARD, GENESIS_ADDRESS)]
        );
        assert_eq!(
            node.persistence().get_metadata(DIFFICULTY_KEY).unwrap(),
            Some(b"1".to_vec())
        );
    }

    #[test]
    fn test_mine_and_send_are_mirrored() {
        let node = Node::new(memory_config()).unwrap();
        node.mine_block("alice").unwrap();
        let block = node.send("alice", "bob", 20, "carol").unwrap();

        assert_eq!(block.transactions.len(), 2);
        let chain = node.chain();
        assert_eq!(chain.get_balance("alice"), 30);
        assert_eq!(chain.get_balance("bob"), 20);
        assert_eq!(chain.get_balance("carol"), 50);

        let store = node.persistence();
        assert_eq!(store.get_block_by_height(2).unwrap(), block);
        assert_eq!(store.get_utxo("alice").unwrap(), vec![TxOutput::new(30, "alice")]);
        assert_eq!(store.get_utxo("bob").unwrap(), vec![TxOutput::new(20, "bob")]);
        let spend = &block.transactions[1];
        assert_eq!(&store.get_transaction(&spend.id).unwrap(), spend);
    }

    #[test]
    fn test_send_without_funds_appends_nothing() {
        let node = Node::new(memory_config()).unwrap();
        let err = node.send("nobody", "bob", 1, "carol").unwrap_err();
        assert!(matches!(err, ChainError::InsufficientFunds { .. }));
        assert_eq!(node.chain().get_height(), 0);
    }

    #[test]
    fn test_storage_failures_are_not_fatal() {
        let node = Node::with_persistence(
            memory_config(),
            Box::new(BrokenStore),
            Arc::new(SystemClock),
        )
        .unwrap();
        let block = node.mine_block("alice").unwrap();
        assert_eq!(block.header.height, 1);
        assert_eq!(node.chain().get_balance("alice"), 50);
    }

    #[test]
    fn test_concurrent_mining_leaves_latest_mirror() {
        let store = InMemoryPersistence::new();
        let node = Node::with_persistence(
            memory_config(),
            Box::new(store.clone()),
            Arc::new(SystemClock),
        )
        .unwrap();

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..3 {
                        node.mine_block("alice").unwrap();
                    }
                });
            }
        });

        let chain = node.chain();
        assert_eq!(chain.get_height(), 12);
        assert_eq!(store.get_utxo("alice").unwrap(), chain.find_utxo("alice"));
        assert_eq!(store.get_utxo("alice").unwrap().len(), 12);
        assert_eq!(
            store.get_metadata(DIFFICULTY_KEY).unwrap(),
            Some(chain.get_difficulty().to_string().into_bytes())
        );
        assert_eq!(store.block_count(), 13);
    }

    #[test]
    fn test_unreadable_store_is_an_error() {
        struct UnreadableStore(InMemoryPersistence);

        impl Persistence for UnreadableStore {
            fn save_block(&self, block: &Block) -> Result<()> {
                self.0.save_block(block)
            }
            fn get_block(&self, hash: &str) -> Result<Block> {
                self.0.get_block(hash)
            }
            fn get_block_by_height(&self, height: u64) -> Result<Block> {
                self.0.get_block_by_height(height)
            }
            fn load_blocks(&self) -> Result<Vec<Block>> {
                Err(ChainError::Serialization("Failed to decode block".to_string()))
            }
            fn save_transaction(&self, tx: &Transaction) -> Result<()> {
                self.0.save_transaction(tx)
            }
            fn get_transaction(&self, id: &str) -> Result<Transaction> {
                self.0.get_transaction(id)
            }
            fn save_utxo(&self, address: &str, outputs: &[TxOutput]) -> Result<()> {
                self.0.save_utxo(address, outputs)
            }
            fn get_utxo(&self, address: &str) -> Result<Vec<TxOutput>> {
                self.0.get_utxo(address)
            }
            fn save_metadata(&self, key: &str, value: &[u8]) -> Result<()> {
                self.0.save_metadata(key, value)
            }
            fn get_metadata(&self, key: &str) -> Result<Option<Vec<u8>>> {
                self.0.get_metadata(key)
            }
        }

        let inner = InMemoryPersistence::new();
        let result = Node::with_persistence(
            memory_config(),
            Box::new(UnreadableStore(inner.clone())),
            Arc::new(SystemClock),
        );
        assert!(matches!(result, Err(ChainError::Serialization(_))));
        assert_eq!(inner.block_count(), 0);
    }

    #[test]
    fn test_unopenable_database_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = memory_config();
        config.database.backend = Backend::Sqlite;
        config.database.path = dir
            .path()
            .join("missing")
            .join("chain.db")
            .to_string_lossy()
            .into_owned();
        let node = Node::new(config).unwrap();
        node.mine_block("alice").unwrap();
        assert_eq!(node.persistence().load_blocks().unwrap().len(), 2);
    }

    #[test]
    fn test_reload_from_shared_store() {
        let store = InMemoryPersistence::new();
        let first = Node::with_persistence(
            memory_config(),
            Box::new(store.clone()),
            Arc::new(SystemClock),
        )
        .unwrap();
        first.mine_block("alice").unwrap();
        first.send("alice", "bob", 5, "alice").unwrap();
        let tip = first.chain().get_latest_block();

        let second =
            Node::with_persistence(memory_config(), Box::new(store), Arc::new(SystemClock)).unwrap();
        let chain = second.chain();
        assert_eq!(chain.get_latest_block(), tip);
        assert_eq!(chain.get_balance("alice"), 95);
        assert_eq!(chain.get_balance("bob"), 5);
        assert!(chain.validate_chain().is_ok());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = memory_config();
        config.miner.reward = 0;
        assert!(matches!(Node::new(config), Err(ChainError::Config(_))));
    }
}
