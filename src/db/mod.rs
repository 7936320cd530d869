use crate::{account::Account, errors::DatabaseError};
use ethereum_types::{Address, H256, U256};
use rustc_hash::FxHashMap;

pub mod cache;
pub mod gen_db;

/// Read-only view of the backing world state.
///
/// Implementations must be thread-safe; the interpreter itself never shares
/// one across threads but hosts may execute disjoint snapshots in parallel.
/// Reading an unknown address must yield a fresh zero account and must not
/// insert anything.
pub trait Database: Send + Sync {
    fn get_account(&self, address: Address) -> Result<Account, DatabaseError>;
    fn get_storage_value(&self, address: Address, key: H256) -> Result<U256, DatabaseError>;
    fn get_block_hash(&self, block_number: u64) -> Result<H256, DatabaseError>;
}

/// Simple in-memory store, used by tests and by hosts that assemble the
/// pre-state themselves.
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    pub accounts: FxHashMap<Address, Account>,
    pub block_hashes: FxHashMap<u64, H256>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&mut self, address: Address, account: Account) {
        self.accounts.insert(address, account);
    }

    pub fn add_block_hash(&mut self, block_number: u64, hash: H256) {
        self.block_hashes.insert(block_number, hash);
    }
}

impl Database for InMemoryDatabase {
    fn get_account(&self, address: Address) -> Result<Account, DatabaseError> {
        Ok(self.accounts.get(&address).cloned().unwrap_or_default())
    }

    fn get_storage_value(&self, address: Address, key: H256) -> Result<U256, DatabaseError> {
        Ok(self
            .accounts
            .get(&address)
            .and_then(|account| account.storage.get(&key))
            .copied()
            .unwrap_or_default())
    }

    fn get_block_hash(&self, block_number: u64) -> Result<H256, DatabaseError> {
        Ok(self
            .block_hashes
            .get(&block_number)
            .copied()
            .unwrap_or_default())
    }
}
