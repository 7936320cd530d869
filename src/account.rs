use bytes::Bytes;
use ethereum_types::{H256, U256};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Balance and nonce of an account, separated from code and storage so that
/// journal backups can copy it cheaply.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub nonce: u64,
    pub balance: U256,
}

impl AccountInfo {
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero()
    }
}

/// A single account of the world state.
///
/// Absent storage keys read as zero; code is immutable once deployed except
/// through the create deposit path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub info: AccountInfo,
    pub code: Bytes,
    pub storage: FxHashMap<H256, U256>,
}

impl Account {
    pub fn new(nonce: u64, balance: U256, code: Bytes) -> Self {
        Self {
            info: AccountInfo { nonce, balance },
            code,
            storage: FxHashMap::default(),
        }
    }

    pub fn has_nonce(&self) -> bool {
        self.info.nonce != 0
    }

    pub fn has_code(&self) -> bool {
        !self.code.is_empty()
    }

    /// A create targeting this account would collide.
    pub fn has_code_or_nonce(&self) -> bool {
        self.has_code() || self.has_nonce()
    }

    /// Present-but-empty accounts are semantically equivalent to absent ones.
    pub fn is_empty(&self) -> bool {
        self.info.is_empty() && !self.has_code()
    }

    pub fn set_code(&mut self, code: Bytes) {
        self.code = code;
    }
}
