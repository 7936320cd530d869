//! # corevm
//!
//! A compact, pure-Rust implementation of the Ethereum Virtual Machine: a
//! stack-based, byte-addressed interpreter that runs contract bytecode
//! against an in-memory world state, charging gas per instruction and
//! producing either return data or a typed failure.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           VM                                │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │  CallFrame  │  │   Memory    │  │       Stack         │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! │                                                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │  Substate   │  │    Hooks    │  │    Environment      │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    GeneralizedDatabase                      │
//! │              (Account state, storage, code)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key components
//!
//! - [`vm::VM`]: the execution engine and interpreter loop
//! - [`call_frame::CallFrame`]: execution context of each call
//! - [`memory::Memory`]: byte-addressed memory with expansion tracking
//! - [`environment::Environment`]: block and transaction context
//! - [`hooks`]: pre/post-execution logic; the default hook implements the
//!   transaction driver (validation, intrinsic gas, fees)
//! - [`db`]: the world-state interface and its journaled cache
//!
//! ## Usage
//!
//! ```ignore
//! use corevm::{
//!     db::gen_db::GeneralizedDatabase, tracing::CallTracer, vm::VM,
//! };
//!
//! let mut db = GeneralizedDatabase::new(store);
//! let mut vm = VM::new(env, &mut db, &tx, CallTracer::disabled());
//! let report = vm.execute()?;
//!
//! if report.is_success() {
//!     println!("gas used: {}", report.gas_used);
//! }
//! ```

pub mod account;
pub mod call_frame;
pub mod constants;
pub mod db;
pub mod environment;
pub mod errors;
pub mod execution_handlers;
pub mod gas_cost;
pub mod hooks;
pub mod memory;
pub mod opcode_handlers;
pub mod opcodes;
pub mod stack;
pub mod tracing;
pub mod utils;
pub mod vm;

pub use account::{Account, AccountInfo};
pub use environment::{Environment, Transaction, TxKind};
pub use errors::{ExecutionReport, TxResult, VMError};
pub use vm::VM;
