//! Storage boundary for PowChain
//!
//! The ledger keeps its authoritative state in memory; a [`Persistence`]
//! backend mirrors blocks, transactions, UTXO buckets and metadata so a chain
//! can be reloaded. Records are stored in their lossless bincode encoding.

use crate::blockchain::Block;
use crate::error::{ChainError, Result};
use crate::transaction::{Transaction, TxOutput};
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub const DIFFICULTY_KEY: &str = "difficulty";

/// Abstraction for persistence backends. Saving a block also saves the
/// transactions it carries.
pub trait Persistence: Send + Sync {
    fn save_block(&self, block: &Block) -> Result<()>;
    fn get_block(&self, hash: &str) -> Result<Block>;
    fn get_block_by_height(&self, height: u64) -> Result<Block>;
    /// Every stored block in ascending height order.
    fn load_blocks(&self) -> Result<Vec<Block>>;
    fn save_transaction(&self, tx: &Transaction) -> Result<()>;
    fn get_transaction(&self, id: &str) -> Result<Transaction>;
    fn save_utxo(&self, address: &str, outputs: &[TxOutput]) -> Result<()>;
    /// Outputs stored for `address`; empty when nothing was stored.
    fn get_utxo(&self, address: &str) -> Result<Vec<TxOutput>>;
    fn save_metadata(&self, key: &str, value: &[u8]) -> Result<()>;
    fn get_metadata(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database. `":memory:"` gives a private
    /// in-process database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| ChainError::Database(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS blocks (
                height INTEGER PRIMARY KEY,
                hash TEXT NOT NULL UNIQUE,
                data BLOB NOT NULL
            );
            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                block_height INTEGER,
                data BLOB NOT NULL
            );
            CREATE TABLE IF NOT EXISTS utxos (
                address TEXT PRIMARY KEY,
                data BLOB NOT NULL
            );
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL
            );",
        )
        .map_err(|e| ChainError::Database(format!("Failed to create tables: {}", e)))?;

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    fn block_where(&self, clause: &str, key: &dyn rusqlite::ToSql, label: String) -> Result<Block> {
        let conn = self.conn.lock();
        let data: Option<Vec<u8>> = conn
            .query_row(
                &format!("SELECT data FROM blocks WHERE {}", clause),
                [key],
                |row| row.get(0),
            )
            .optional()?;
        match data {
            Some(bytes) => Block::decode(&bytes),
            None => Err(ChainError::BlockNotFound(label)),
        }
    }
}

impl Persistence for Database {
    fn save_block(&self, block: &Block) -> Result<()> {
        let encoded = block.encode()?;
        let height = block.header.height as i64;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO blocks (height, hash, data) VALUES (?1, ?2, ?3)",
            params![height, block.header.hash, encoded],
        )
        .map_err(|e| ChainError::Database(format!("Failed to save block: {}", e)))?;
        for t in &block.transactions {
            tx.execute(
                "INSERT OR REPLACE INTO transactions (id, block_height, data) VALUES (?1, ?2, ?3)",
                params![t.id, height, t.encode()?],
            )
            .map_err(|e| ChainError::Database(format!("Failed to save transaction: {}", e)))?;
        }
        tx.commit()
            .map_err(|e| ChainError::Database(format!("Failed to commit block: {}", e)))?;
        Ok(())
    }

    fn get_block(&self, hash: &str) -> Result<Block> {
        self.block_where("hash = ?1", &hash, hash.to_string())
    }

    fn get_block_by_height(&self, height: u64) -> Result<Block> {
        self.block_where("height = ?1", &(height as i64), format!("height {}", height))
    }

    fn load_blocks(&self) -> Result<Vec<Block>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT data FROM blocks ORDER BY height ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, Vec<u8>>(0))?;

        let mut blocks = Vec::new();
        for row in rows {
            blocks.push(Block::decode(&row?)?);
        }
        Ok(blocks)
    }

    fn save_transaction(&self, tx: &Transaction) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO transactions (id, block_height, data) VALUES (?1, NULL, ?2)",
            params![tx.id, tx.encode()?],
        )
        .map_err(|e| ChainError::Database(format!("Failed to save transaction: {}", e)))?;
        Ok(())
    }

    fn get_transaction(&self, id: &str) -> Result<Transaction> {
        let conn = self.conn.lock();
        let data: Option<Vec<u8>> = conn
            .query_row("SELECT data FROM transactions WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;
        match data {
            Some(bytes) => Transaction::decode(&bytes),
            None => Err(ChainError::TransactionNotFound(id.to_string())),
        }
    }

    fn save_utxo(&self, address: &str, outputs: &[TxOutput]) -> Result<()> {
        let encoded = bincode::serialize(outputs)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO utxos (address, data) VALUES (?1, ?2)",
            params![address, encoded],
        )
        .map_err(|e| ChainError::Database(format!("Failed to save UTXO: {}", e)))?;
        Ok(())
    }

    fn get_utxo(&self, address: &str) -> Result<Vec<TxOutput>> {
        let conn = self.conn.lock();
        let data: Option<Vec<u8>> = conn
            .query_row("SELECT data FROM utxos WHERE address = ?1", [address], |row| row.get(0))
            .optional()?;
        match data {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    fn save_metadata(&self, key: &str, value: &[u8]) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(|e| ChainError::Database(format!("Failed to save metadata: {}", e)))?;
        Ok(())
    }

    fn get_metadata(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| row.get(0))
            .optional()?)
    }
}

#[derive(Default)]
struct MemoryStore {
    blocks: HashMap<String, Block>,
    heights: BTreeMap<u64, String>,
    transactions: HashMap<String, Transaction>,
    utxos: HashMap<String, Vec<TxOutput>>,
    metadata: HashMap<String, Vec<u8>>,
}

/// Simple in-memory persistence implementation useful for tests and
/// ephemeral runs. Clones share the same storage.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    store: Arc<RwLock<MemoryStore>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block_count(&self) -> usize {
        self.store.read().blocks.len()
    }

    pub fn transaction_count(&self) -> usize {
        self.store.read().transactions.len()
    }
}

impl Persistence for InMemoryPersistence {
    fn save_block(&self, block: &Block) -> Result<()> {
        let mut store = self.store.write();
        if let Some(old_hash) = store.heights.insert(block.header.height, block.header.hash.clone()) {
            store.blocks.remove(&old_hash);
        }
        store.blocks.insert(block.header.hash.clone(), block.clone());
        for tx in &block.transactions {
            store.transactions.insert(tx.id.clone(), tx.clone());
        }
        Ok(())
    }

    fn get_block(&self, hash: &str) -> Result<Block> {
        self.store
            .read()
            .blocks
            .get(hash)
            .cloned()
            .ok_or_else(|| ChainError::BlockNotFound(hash.to_string()))
    }

    fn get_block_by_height(&self, height: u64) -> Result<Block> {
        let store = self.store.read();
        store
            .heights
            .get(&height)
            .and_then(|hash| store.blocks.get(hash))
            .cloned()
            .ok_or_else(|| ChainError::BlockNotFound(format!("height {}", height)))
    }

    fn load_blocks(&self) -> Result<Vec<Block>> {
        let store = self.store.read();
        Ok(store
            .heights
            .values()
            .filter_map(|hash| store.blocks.get(hash).cloned())
            .collect())
    }

    fn save_transaction(&self, tx: &Transaction) -> Result<()> {
        self.store
            .write()
            .transactions
            .insert(tx.id.clone(), tx.clone());
        Ok(())
    }

    fn get_transaction(&self, id: &str) -> Result<Transaction> {
        self.store
            .read()
            .transactions
            .get(id)
            .cloned()
            .ok_or_else(|| ChainError::TransactionNotFound(id.to_string()))
    }

    fn save_utxo(&self, address: &str, outputs: &[TxOutput]) -> Result<()> {
        self.store
            .write()
            .utxos
            .insert(address.to_string(), outputs.to_vec());
        Ok(())
    }

    fn get_utxo(&self, address: &str) -> Result<Vec<TxOutput>> {
        Ok(self.store.read().utxos.get(address).cloned().unwrap_or_default())
    }

    fn save_metadata(&self, key: &str, value: &[u8]) -> Result<()> {
        self.store
            .write()
            .metadata
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_metadata(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.store.read().metadata.get(key).cloned())
    }
}
