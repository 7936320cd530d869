use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

/// Block and transaction metadata, immutable for the duration of one
/// transaction. Environmental and block opcodes read from here.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Externally owned account that signed the transaction.
    pub origin: Address,
    /// Gas limit of the transaction, not of the block.
    pub gas_limit: u64,
    pub gas_price: U256,
    pub block_number: U256,
    pub coinbase: Address,
    pub timestamp: U256,
    pub prev_randao: Option<H256>,
    pub chain_id: U256,
    pub base_fee_per_gas: U256,
    pub block_gas_limit: u64,
}

/// Call target of a transaction. A missing recipient means contract creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxKind {
    Call(Address),
    Create,
}

/// The externally submitted transaction, already signature-checked by the
/// host. The driver validates nonce, gas and funds before running any code.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: U256,
    pub to: TxKind,
    pub value: U256,
    pub data: Bytes,
}

impl Transaction {
    pub fn is_create(&self) -> bool {
        matches!(self.to, TxKind::Create)
    }
}
