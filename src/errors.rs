use crate::vm::Log;
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

/// Top level error wrapper returned by opcode handlers and the VM itself.
///
/// Only `Internal` and `Database` variants escape the interpreter loop; every
/// other variant halts the current call frame and is translated into a
/// [`ContextResult`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum VMError {
    #[error("Revert opcode")]
    RevertOpcode,
    #[error("{0}")]
    ExceptionalHalt(#[from] ExceptionalHalt),
    #[error("{0}")]
    TxValidation(#[from] TxValidationError),
    #[error("{0}")]
    Internal(#[from] InternalError),
    #[error("{0}")]
    Database(#[from] DatabaseError),
}

impl VMError {
    /// True when the error was raised by the REVERT opcode, which preserves
    /// the frame's output and refunds unused gas.
    pub fn is_revert_opcode(&self) -> bool {
        matches!(self, VMError::RevertOpcode)
    }

    /// Errors that must reach the host instead of being contained in the
    /// current call frame.
    pub fn should_propagate(&self) -> bool {
        matches!(self, VMError::Internal(_) | VMError::Database(_))
    }
}

/// Exceptional halts consume all gas remaining in the frame (except where a
/// handler charges first and fails later, which nets out the same).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ExceptionalHalt {
    #[error("Out of gas")]
    OutOfGas,
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Stack overflow")]
    StackOverflow,
    #[error("Invalid opcode")]
    InvalidOpcode,
    #[error("Invalid jump destination")]
    InvalidJump,
    #[error("Opcode not allowed in static context")]
    OpcodeNotAllowedInStaticContext,
    #[error("Memory offset or size out of addressable range")]
    MemoryOffsetOverflow,
    #[error("Offset out of bounds")]
    OutOfBounds,
    #[error("Contract output too big")]
    ContractOutputTooBig,
    #[error("Invalid contract prefix")]
    InvalidContractPrefix,
    #[error("Nonce overflow")]
    NonceOverflow,
    #[error("Balance underflow")]
    BalanceUnderflow,
    #[error("Balance overflow")]
    BalanceOverflow,
    #[error("Address already occupied")]
    AddressAlreadyOccupied,
}

/// Pre-execution transaction rejections. These are raised by the driver hook
/// before any bytecode runs and surface to the caller as errors, not reports.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum TxValidationError {
    #[error("Invalid nonce: expected {expected}, got {actual}")]
    InvalidNonce { expected: u64, actual: u64 },
    #[error("Intrinsic gas too low")]
    IntrinsicGasTooLow,
    #[error("Insufficient account funds")]
    InsufficientAccountFunds,
    #[error("Gas limit price product overflow")]
    GasLimitPriceProductOverflow,
    #[error("Transaction gas limit {tx_gas_limit} exceeds block gas limit {block_gas_limit}")]
    GasAllowanceExceeded {
        tx_gas_limit: u64,
        block_gas_limit: u64,
    },
}

/// Invariant breaches. These never halt just the frame; they abort the whole
/// execution and reach the host.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum InternalError {
    #[error("Arithmetic overflow")]
    Overflow,
    #[error("Arithmetic underflow")]
    Underflow,
    #[error("Account should have been cached")]
    AccountShouldHaveBeenCached,
    #[error("Could not pop call frame")]
    CouldNotPopCallframe,
    #[error("Could not pop substate backup")]
    CouldNotPopSubstateBackup,
    #[error("Slicing error")]
    Slicing,
    #[error("{0}")]
    Custom(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum DatabaseError {
    #[error("Database error: {0}")]
    Custom(String),
}

/// What the interpreter loop should do after an opcode executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeResult {
    Continue,
    Halt,
}

/// Outcome of one execution context (a single call frame or the whole
/// transaction).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxResult {
    Success,
    Revert(VMError),
}

/// Result of a finished call frame, consumed by the parent frame or, for the
/// initial frame, turned into an [`ExecutionReport`].
#[derive(Debug, Clone)]
pub struct ContextResult {
    pub result: TxResult,
    pub gas_used: u64,
    pub output: Bytes,
}

impl ContextResult {
    pub fn is_success(&self) -> bool {
        matches!(self.result, TxResult::Success)
    }
}

/// Final outcome of a transaction.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub result: TxResult,
    pub gas_used: u64,
    pub gas_refunded: u64,
    pub output: Bytes,
    pub logs: Vec<Log>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        matches!(self.result, TxResult::Success)
    }
}
