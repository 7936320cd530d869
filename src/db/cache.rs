use crate::account::Account;
use ethereum_types::Address;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Transaction-local view of the world state. Accounts are wrapped in `Arc`
/// so journal backups can be taken without deep-copying storage.
pub type CacheDB = FxHashMap<Address, Arc<Account>>;

pub fn get_account(cached_accounts: &CacheDB, address: &Address) -> Option<Arc<Account>> {
    cached_accounts.get(address).cloned()
}

/// Inserts an account (which will be wrapped in an Arc) into the cache.
/// Returns the previous entry if one existed for this address.
pub fn insert_account(
    cached_accounts: &mut CacheDB,
    address: Address,
    account: Account,
) -> Option<Arc<Account>> {
    cached_accounts.insert(address, Arc::new(account))
}

pub fn insert_arc_account(
    cached_accounts: &mut CacheDB,
    address: Address,
    account: Arc<Account>,
) -> Option<Arc<Account>> {
    cached_accounts.insert(address, account)
}

pub fn is_account_cached(cached_accounts: &CacheDB, address: &Address) -> bool {
    cached_accounts.contains_key(address)
}

/// Gets a mutable reference to a cached account, cloning the underlying data
/// first when the `Arc` is shared (copy-on-write via `Arc::make_mut`).
pub fn get_or_make_mut_account<'cache>(
    cached_accounts: &'cache mut CacheDB,
    address: &Address,
) -> Option<&'cache mut Account> {
    cached_accounts.get_mut(address).map(Arc::make_mut)
}
