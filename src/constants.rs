use ethereum_types::U256;

pub const WORD_SIZE: usize = 32;
pub const WORD_SIZE_IN_BYTES_USIZE: usize = 32;
pub const WORD_SIZE_IN_BYTES_U64: u64 = 32;

pub const STACK_LIMIT: usize = 1024;

pub const SUCCESS: U256 = U256::one();
pub const FAIL: U256 = U256::zero();

pub const MEMORY_EXPANSION_QUOTIENT: usize = 512;

// Transaction costs in gas
pub const TX_BASE_COST: u64 = 21000;
// Intrinsic surcharge for contract-creation transactions.
pub const TX_CREATE_GAS: u64 = 53000;

pub const MAX_CODE_SIZE: usize = 0x6000;
pub const INIT_CODE_MAX_SIZE: usize = 49152;

// https://eips.ethereum.org/EIPS/eip-3541
pub const EOF_PREFIX: u8 = 0xef;

// Maximum nesting depth for message calls and creates.
pub const MAX_CALL_DEPTH: usize = 1024;

// BLOCKHASH serves only the most recent 256 blocks.
pub const LAST_AVAILABLE_BLOCK_LIMIT: U256 = U256([256, 0, 0, 0]);
