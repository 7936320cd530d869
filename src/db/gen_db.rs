use crate::{
    account::Account,
    call_frame::CallFrameBackup,
    db::{
        cache::{self, CacheDB},
        Database,
    },
    errors::{DatabaseError, ExceptionalHalt, InternalError, VMError},
    vm::VM,
};
use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// The world state as the interpreter sees it: a read-through cache of
/// copy-on-write accounts in front of the backing [`Database`].
///
/// All mutation goes through the [`VM`] methods below, which record undo
/// information in the current frame's [`CallFrameBackup`] first. After a
/// transaction commits, `cache` holds the post-state.
#[derive(Clone)]
pub struct GeneralizedDatabase {
    pub store: Arc<dyn Database>,
    pub cache: CacheDB,
}

impl GeneralizedDatabase {
    pub fn new(store: Arc<dyn Database>) -> Self {
        Self {
            store,
            cache: CacheDB::default(),
        }
    }

    /// Gets an account, first checking the cache and then the backing store
    /// (caching in the second case).
    pub fn get_account(&mut self, address: Address) -> Result<Arc<Account>, DatabaseError> {
        if let Some(account) = cache::get_account(&self.cache, &address) {
            Ok(account)
        } else {
            let account = Arc::new(self.store.get_account(address)?);
            cache::insert_arc_account(&mut self.cache, address, Arc::clone(&account));
            Ok(account)
        }
    }
}

impl<'a> VM<'a> {
    /// Mutable access to an account. Backs up the account's pre-frame state
    /// before handing out the reference.
    pub fn get_account_mut(&mut self, address: Address) -> Result<&mut Account, VMError> {
        if !cache::is_account_cached(&self.db.cache, &address) {
            let account = self.db.store.get_account(address)?;
            cache::insert_account(&mut self.db.cache, address, account);
        }

        self.backup_account_info(address)?;

        cache::get_or_make_mut_account(&mut self.db.cache, &address)
            .ok_or(InternalError::AccountShouldHaveBeenCached.into())
    }

    pub fn increase_account_balance(
        &mut self,
        address: Address,
        increase: U256,
    ) -> Result<(), VMError> {
        let account = self.get_account_mut(address)?;
        account.info.balance = account
            .info
            .balance
            .checked_add(increase)
            .ok_or(ExceptionalHalt::BalanceOverflow)?;
        Ok(())
    }

    pub fn decrease_account_balance(
        &mut self,
        address: Address,
        decrease: U256,
    ) -> Result<(), VMError> {
        let account = self.get_account_mut(address)?;
        account.info.balance = account
            .info
            .balance
            .checked_sub(decrease)
            .ok_or(ExceptionalHalt::BalanceUnderflow)?;
        Ok(())
    }

    /// Moves `value` wei between two accounts, rejecting the transfer before
    /// any mutation when the sender cannot cover it.
    pub fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), VMError> {
        if value.is_zero() {
            return Ok(());
        }
        self.decrease_account_balance(from, value)?;
        self.increase_account_balance(to, value)
    }

    pub fn increment_account_nonce(&mut self, address: Address) -> Result<u64, VMError> {
        let account = self.get_account_mut(address)?;
        account.info.nonce = account
            .info
            .nonce
            .checked_add(1)
            .ok_or(ExceptionalHalt::NonceOverflow)?;
        Ok(account.info.nonce)
    }

    pub fn update_account_bytecode(
        &mut self,
        address: Address,
        new_bytecode: Bytes,
    ) -> Result<(), VMError> {
        let account = self.get_account_mut(address)?;
        account.set_code(new_bytecode);
        Ok(())
    }

    /// Storage value as seen by this transaction, read through the cache.
    pub fn get_storage_value(&mut self, address: Address, key: H256) -> Result<U256, VMError> {
        if let Some(account) = cache::get_account(&self.db.cache, &address) {
            if let Some(value) = account.storage.get(&key) {
                return Ok(*value);
            }
        }

        let value = self.db.store.get_storage_value(address, key)?;

        // Cache the slot without registering a frame-level mutation: reads
        // must survive reverts unchanged.
        if !cache::is_account_cached(&self.db.cache, &address) {
            let account = self.db.store.get_account(address)?;
            cache::insert_account(&mut self.db.cache, address, account);
        }
        if let Some(account) = cache::get_or_make_mut_account(&mut self.db.cache, &address) {
            account.storage.entry(key).or_insert(value);
        }

        Ok(value)
    }

    /// Storage value at transaction start, for SSTORE gas and refunds.
    pub fn get_original_storage(&mut self, address: Address, key: H256) -> Result<U256, VMError> {
        if let Some(value) = self
            .storage_original_values
            .get(&address)
            .and_then(|account_storage| account_storage.get(&key))
        {
            return Ok(*value);
        }

        let value = self.get_storage_value(address, key)?;
        self.storage_original_values
            .entry(address)
            .or_default()
            .insert(key, value);
        Ok(value)
    }

    /// Reads a storage slot, recording it as warm. Returns the value and
    /// whether the slot was cold before this access.
    pub fn access_storage_slot(
        &mut self,
        address: Address,
        key: H256,
    ) -> Result<(U256, bool), VMError> {
        let storage_slot_was_cold = self
            .substate
            .accessed_storage_slots
            .entry(address)
            .or_default()
            .insert(key);

        let value = self.get_storage_value(address, key)?;

        Ok((value, storage_slot_was_cold))
    }

    pub fn update_account_storage(
        &mut self,
        address: Address,
        key: H256,
        new_value: U256,
    ) -> Result<(), VMError> {
        self.backup_storage_slot(address, key)?;

        let account = self.get_account_mut(address)?;
        account.storage.insert(key, new_value);
        Ok(())
    }

    fn backup_storage_slot(&mut self, address: Address, key: H256) -> Result<(), VMError> {
        let value = self.get_storage_value(address, key)?;

        self.current_call_frame
            .call_frame_backup
            .original_account_storage_slots
            .entry(address)
            .or_insert_with(FxHashMap::default)
            .entry(key)
            .or_insert(value);

        Ok(())
    }

    /// Records the account's balance, nonce and code before the first
    /// mutation within the current frame.
    pub fn backup_account_info(&mut self, address: Address) -> Result<(), VMError> {
        if self
            .current_call_frame
            .call_frame_backup
            .original_accounts_info
            .contains_key(&address)
        {
            return Ok(());
        }

        let account = self.db.get_account(address)?;
        let backup = Account {
            info: account.info.clone(),
            code: account.code.clone(),
            // Storage slots are backed up individually on write.
            storage: FxHashMap::default(),
        };

        self.current_call_frame
            .call_frame_backup
            .original_accounts_info
            .insert(address, backup);

        Ok(())
    }

    /// Restores every account and storage slot recorded in the current
    /// frame's backup, undoing the frame's world-state effects.
    pub fn restore_cache_state(&mut self) -> Result<(), VMError> {
        let backup = std::mem::take(&mut self.current_call_frame.call_frame_backup);

        for (address, original) in backup.original_accounts_info {
            if let Some(account) = cache::get_or_make_mut_account(&mut self.db.cache, &address) {
                account.info = original.info;
                account.code = original.code;
            } else {
                cache::insert_account(&mut self.db.cache, address, original);
            }
        }

        for (address, slots) in backup.original_account_storage_slots {
            let account = cache::get_or_make_mut_account(&mut self.db.cache, &address)
                .ok_or(InternalError::AccountShouldHaveBeenCached)?;
            for (key, value) in slots {
                account.storage.insert(key, value);
            }
        }

        Ok(())
    }

    /// Folds a finished child frame's backup into the parent's, so that a
    /// later revert of the parent also undoes the child's effects. Entries
    /// the parent already holds win: they are older.
    pub fn merge_call_frame_backup_with_parent(
        &mut self,
        child_backup: &CallFrameBackup,
    ) -> Result<(), VMError> {
        let parent_backup = &mut self.current_call_frame.call_frame_backup;

        for (address, account) in &child_backup.original_accounts_info {
            parent_backup
                .original_accounts_info
                .entry(*address)
                .or_insert_with(|| account.clone());
        }

        for (address, slots) in &child_backup.original_account_storage_slots {
            let parent_slots = parent_backup
                .original_account_storage_slots
                .entry(*address)
                .or_insert_with(FxHashMap::default);
            for (key, value) in slots {
                parent_slots.entry(*key).or_insert(*value);
            }
        }

        Ok(())
    }
}
