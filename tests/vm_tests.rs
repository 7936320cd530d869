//! End-to-end execution tests: whole transactions run through the VM
//! against an in-memory world state.

use bytes::Bytes;
use corevm::{
    db::{gen_db::GeneralizedDatabase, InMemoryDatabase},
    errors::{ExecutionReport, TxValidationError, VMError},
    tracing::CallTracer,
    utils::calculate_create_address,
    vm::VM,
    Account, Environment, Transaction, TxKind,
};
use ethereum_types::{Address, H256, U256};
use std::sync::Arc;

const SENDER: Address = Address::repeat_byte(0xaa);
const CONTRACT: Address = Address::repeat_byte(0xbb);
const CALLEE: Address = Address::repeat_byte(0xcc);
const COINBASE: Address = Address::repeat_byte(0x01);

const DEFAULT_GAS_LIMIT: u64 = 1_000_000;

fn word(n: u64) -> U256 {
    U256::from(n)
}

fn rich_sender() -> Account {
    Account::new(0, U256::from(10).pow(U256::from(18)), Bytes::new())
}

fn test_env(gas_limit: u64) -> Environment {
    Environment {
        origin: SENDER,
        gas_limit,
        gas_price: U256::one(),
        block_number: word(1),
        coinbase: COINBASE,
        timestamp: word(1_700_000_000),
        prev_randao: None,
        chain_id: word(1),
        base_fee_per_gas: U256::zero(),
        block_gas_limit: 30_000_000,
    }
}

fn call_tx(gas_limit: u64, data: Vec<u8>, value: U256) -> Transaction {
    Transaction {
        nonce: 0,
        gas_limit,
        gas_price: U256::one(),
        to: TxKind::Call(CONTRACT),
        value,
        data: Bytes::from(data),
    }
}

/// Runs `code` as the contract under test with the given calldata and
/// returns the report plus the post-state database.
fn run_code_with_calldata(
    code: Vec<u8>,
    calldata: Vec<u8>,
    gas_limit: u64,
) -> (ExecutionReport, GeneralizedDatabase) {
    let mut store = InMemoryDatabase::new();
    store.add_account(SENDER, rich_sender());
    store.add_account(CONTRACT, Account::new(0, U256::zero(), Bytes::from(code)));

    let mut db = GeneralizedDatabase::new(Arc::new(store));
    let tx = call_tx(gas_limit, calldata, U256::zero());
    let report = VM::new(test_env(gas_limit), &mut db, &tx, CallTracer::disabled())
        .execute()
        .expect("transaction should not be rejected");
    (report, db)
}

fn run_code(code: Vec<u8>) -> (ExecutionReport, GeneralizedDatabase) {
    run_code_with_calldata(code, vec![], DEFAULT_GAS_LIMIT)
}

/// Runs `code` and also returns the VM's final top-of-stack, observable
/// because the initial frame survives execution.
fn run_code_inspect_stack(code: Vec<u8>) -> (ExecutionReport, Option<U256>) {
    let mut store = InMemoryDatabase::new();
    store.add_account(SENDER, rich_sender());
    store.add_account(CONTRACT, Account::new(0, U256::zero(), Bytes::from(code)));

    let mut db = GeneralizedDatabase::new(Arc::new(store));
    let tx = call_tx(DEFAULT_GAS_LIMIT, vec![], U256::zero());
    let mut vm = VM::new(
        test_env(DEFAULT_GAS_LIMIT),
        &mut db,
        &tx,
        CallTracer::disabled(),
    );
    let report = vm.execute().expect("transaction should not be rejected");
    let top = vm.current_call_frame.stack.get(0).copied().ok();
    (report, top)
}

fn balance_of(db: &GeneralizedDatabase, address: Address) -> U256 {
    db.cache
        .get(&address)
        .map(|account| account.info.balance)
        .unwrap_or_default()
}

fn storage_of(db: &GeneralizedDatabase, address: Address, key: u64) -> U256 {
    db.cache
        .get(&address)
        .and_then(|account| account.storage.get(&H256(U256::from(key).to_big_endian())))
        .copied()
        .unwrap_or_default()
}

fn is_exception(report: &ExecutionReport) -> bool {
    match &report.result {
        corevm::TxResult::Success => false,
        corevm::TxResult::Revert(err) => !err.is_revert_opcode(),
    }
}

fn is_revert(report: &ExecutionReport) -> bool {
    match &report.result {
        corevm::TxResult::Success => false,
        corevm::TxResult::Revert(err) => err.is_revert_opcode(),
    }
}

// =========================================================================
// Arithmetic programs
// =========================================================================

#[test]
fn add_program() {
    // PUSH1 10, PUSH1 5, ADD, STOP
    let (report, top) = run_code_inspect_stack(vec![0x60, 0x0a, 0x60, 0x05, 0x01, 0x00]);

    assert!(report.is_success());
    assert!(report.output.is_empty());
    // 21000 intrinsic + 3 + 3 + 3
    assert_eq!(report.gas_used, 21_009);
    assert_eq!(top, Some(word(15)));
}

#[test]
fn exp_program() {
    // PUSH5 0x020301FF01, PUSH1 5, EXP, STOP
    let (report, top) = run_code_inspect_stack(vec![
        0x64, 0x02, 0x03, 0x01, 0xff, 0x01, 0x60, 0x05, 0x0a, 0x00,
    ]);

    assert!(report.is_success());
    let expected = U256::from(0x020301ff01u64).overflowing_pow(word(5)).0;
    assert_eq!(top, Some(expected));
}

#[test]
fn sdiv_min_by_minus_one_wraps() {
    // PUSH32 -1, PUSH32 2^255, SDIV: i256::MIN / -1 wraps back to i256::MIN.
    let mut code = vec![0x7f];
    code.extend_from_slice(&[0xff; 32]);
    code.push(0x7f);
    let mut min = [0u8; 32];
    min[0] = 0x80;
    code.extend_from_slice(&min);
    code.extend_from_slice(&[0x05, 0x00]);

    let (report, top) = run_code_inspect_stack(code);

    assert!(report.is_success());
    assert_eq!(top, Some(U256::one() << 255));
}

#[test]
fn smod_takes_sign_of_dividend() {
    // -7 mod 3: PUSH1 3, PUSH32 -7, SMOD. Expect -1 (two's complement).
    let minus_seven = U256::MAX - word(6);
    let mut code = vec![0x60, 0x03, 0x7f];
    code.extend_from_slice(&minus_seven.to_big_endian());
    code.extend_from_slice(&[0x07, 0x00]);

    let (report, top) = run_code_inspect_stack(code);

    assert!(report.is_success());
    assert_eq!(top, Some(U256::MAX)); // -1
}

// =========================================================================
// Memory programs
// =========================================================================

#[test]
fn mstore_then_mload() {
    // PUSH1 0xFF, PUSH1 0, MSTORE, PUSH1 0, MLOAD, STOP
    let mut store = InMemoryDatabase::new();
    store.add_account(SENDER, rich_sender());
    store.add_account(
        CONTRACT,
        Account::new(
            0,
            U256::zero(),
            Bytes::from_static(&[0x60, 0xff, 0x60, 0x00, 0x52, 0x60, 0x00, 0x51, 0x00]),
        ),
    );

    let mut db = GeneralizedDatabase::new(Arc::new(store));
    let tx = call_tx(DEFAULT_GAS_LIMIT, vec![], U256::zero());
    let mut vm = VM::new(
        test_env(DEFAULT_GAS_LIMIT),
        &mut db,
        &tx,
        CallTracer::disabled(),
    );
    let report = vm.execute().unwrap();

    assert!(report.is_success());
    assert_eq!(vm.current_call_frame.stack.get(0).copied(), Ok(word(0xff)));
    assert_eq!(vm.current_call_frame.memory.len(), 32);
}

#[test]
fn calldatacopy_pads_with_zeros() {
    // PUSH1 32, PUSH1 0, PUSH1 0, CALLDATACOPY, STOP with 8 bytes calldata.
    let calldata = vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
    let code = vec![0x60, 0x20, 0x60, 0x00, 0x60, 0x00, 0x37, 0x00];

    let mut store = InMemoryDatabase::new();
    store.add_account(SENDER, rich_sender());
    store.add_account(CONTRACT, Account::new(0, U256::zero(), Bytes::from(code)));

    let mut db = GeneralizedDatabase::new(Arc::new(store));
    let tx = call_tx(DEFAULT_GAS_LIMIT, calldata.clone(), U256::zero());
    let mut vm = VM::new(
        test_env(DEFAULT_GAS_LIMIT),
        &mut db,
        &tx,
        CallTracer::disabled(),
    );
    let report = vm.execute().unwrap();

    assert!(report.is_success());
    assert_eq!(vm.current_call_frame.memory.len(), 32);
    let contents = vm.current_call_frame.memory.load_range(0, 32).unwrap();
    assert_eq!(&contents[..8], &calldata[..]);
    assert_eq!(&contents[8..], &[0u8; 24][..]);
}

#[test]
fn msize_grows_with_word_granularity() {
    // PUSH1 1, PUSH1 33, MSTORE8, MSIZE, STOP: one byte at offset 33 needs
    // two words.
    let (report, top) = run_code_inspect_stack(vec![0x60, 0x01, 0x60, 0x21, 0x53, 0x59, 0x00]);

    assert!(report.is_success());
    assert_eq!(top, Some(word(64)));
}

// =========================================================================
// Control flow
// =========================================================================

#[test]
fn jump_to_jumpdest_succeeds() {
    // PUSH1 4, JUMP, INVALID, JUMPDEST, STOP
    let (report, _) = run_code_inspect_stack(vec![0x60, 0x04, 0x56, 0xfe, 0x5b, 0x00]);
    assert!(report.is_success());
}

#[test]
fn jump_to_non_jumpdest_fails() {
    // PUSH1 3, JUMP, STOP, STOP: target 3 is not a JUMPDEST.
    let (report, _) = run_code(vec![0x60, 0x03, 0x56, 0x00, 0x00]);
    assert!(is_exception(&report));
    assert_eq!(report.gas_used, DEFAULT_GAS_LIMIT);
}

#[test]
fn jump_into_push_immediate_fails() {
    // PUSH1 3, JUMP, PUSH2 0x5b00, STOP: the 0x5b at offset 4 is immediate
    // data, not a real JUMPDEST.
    let (report, _) = run_code(vec![0x60, 0x04, 0x56, 0x61, 0x5b, 0x00, 0x00]);
    assert!(is_exception(&report));
}

#[test]
fn jumpi_falls_through_on_zero_condition() {
    // PUSH1 0, PUSH1 99, JUMPI, PUSH1 7, STOP: invalid target is never taken.
    let (report, top) = run_code_inspect_stack(vec![0x60, 0x00, 0x60, 0x63, 0x57, 0x60, 0x07, 0x00]);
    assert!(report.is_success());
    assert_eq!(top, Some(word(7)));
}

#[test]
fn running_off_the_code_end_is_implicit_stop() {
    // PUSH1 1, PUSH1 2, ADD and no terminator.
    let (report, top) = run_code_inspect_stack(vec![0x60, 0x01, 0x60, 0x02, 0x01]);
    assert!(report.is_success());
    assert!(report.output.is_empty());
    assert_eq!(top, Some(word(3)));
}

// =========================================================================
// Gas accounting
// =========================================================================

#[test]
fn out_of_gas_consumes_everything_and_reverts_state() {
    // PUSH1 (3), PUSH1 (3), MUL (5) with exactly 10 gas on top of the
    // intrinsic cost: MUL cannot be paid.
    let gas_limit = 21_010;
    let (report, db) = run_code_with_calldata(vec![0x60, 0x02, 0x60, 0x03, 0x02, 0x00], vec![], gas_limit);

    assert!(is_exception(&report));
    assert_eq!(report.gas_used, gas_limit);
    // The whole pre-payment went to the coinbase; only the value transfer
    // rollback touched the sender.
    assert_eq!(
        balance_of(&db, SENDER),
        rich_sender().info.balance - word(gas_limit)
    );
    assert_eq!(balance_of(&db, COINBASE), word(gas_limit));
}

#[test]
fn unused_gas_is_refunded_to_sender() {
    let (report, db) = run_code(vec![0x00]); // STOP

    assert!(report.is_success());
    assert_eq!(report.gas_used, 21_000);
    assert_eq!(
        balance_of(&db, SENDER),
        rich_sender().info.balance - word(21_000)
    );
    assert_eq!(balance_of(&db, COINBASE), word(21_000));
}

#[test]
fn invalid_opcode_consumes_all_gas() {
    let (report, _) = run_code(vec![0xfe]);
    assert!(is_exception(&report));
    assert_eq!(report.gas_used, DEFAULT_GAS_LIMIT);

    // Unknown bytes behave the same as the designated INVALID opcode.
    let (report, _) = run_code(vec![0x0c]);
    assert!(is_exception(&report));
    assert_eq!(report.gas_used, DEFAULT_GAS_LIMIT);
}

#[test]
fn stack_underflow_halts_the_frame() {
    let (report, _) = run_code(vec![0x01]); // ADD on an empty stack
    assert!(is_exception(&report));
    assert_eq!(report.gas_used, DEFAULT_GAS_LIMIT);
}

// =========================================================================
// Storage and revert semantics
// =========================================================================

#[test]
fn sstore_persists_on_success() {
    // PUSH1 42, PUSH1 0, SSTORE, STOP
    let (report, db) = run_code(vec![0x60, 0x2a, 0x60, 0x00, 0x55, 0x00]);

    assert!(report.is_success());
    assert_eq!(storage_of(&db, CONTRACT, 0), word(42));
}

#[test]
fn revert_rolls_back_storage_and_keeps_output() {
    // PUSH1 42, PUSH1 0, SSTORE, then store 0x2a in memory and REVERT the
    // first byte of that word.
    let code = vec![
        0x60, 0x2a, 0x60, 0x00, 0x55, // SSTORE(0, 42)
        0x60, 0x2a, 0x60, 0x00, 0x52, // MSTORE(0, 42)
        0x60, 0x20, 0x60, 0x00, 0xfd, // REVERT(0, 32)
    ];

    let mut store = InMemoryDatabase::new();
    store.add_account(SENDER, rich_sender());
    let mut contract = Account::new(0, U256::zero(), Bytes::from(code));
    contract.storage.insert(H256::zero(), word(7));
    store.add_account(CONTRACT, contract);

    let mut db = GeneralizedDatabase::new(Arc::new(store));
    let tx = call_tx(DEFAULT_GAS_LIMIT, vec![], U256::zero());
    let report = VM::new(test_env(DEFAULT_GAS_LIMIT), &mut db, &tx, CallTracer::disabled())
        .execute()
        .unwrap();

    assert!(is_revert(&report));
    // Output survives a revert.
    assert_eq!(report.output.len(), 32);
    assert_eq!(U256::from_big_endian(&report.output), word(42));
    // The storage write does not.
    assert_eq!(storage_of(&db, CONTRACT, 0), word(7));
    // Unused gas was refunded: a revert is cheaper than exhaustion.
    assert!(report.gas_used < DEFAULT_GAS_LIMIT);
    // No logs escape a reverted frame.
    assert!(report.logs.is_empty());
}

#[test]
fn revert_keeps_nonce_bump_and_gas_payment() {
    // PUSH1 0, PUSH1 0, REVERT
    let (report, db) = run_code(vec![0x60, 0x00, 0x60, 0x00, 0xfd]);

    assert!(is_revert(&report));
    let sender = db.cache.get(&SENDER).expect("sender must be cached");
    assert_eq!(sender.info.nonce, 1);
    assert_eq!(
        sender.info.balance,
        rich_sender().info.balance - word(report.gas_used)
    );
}

#[test]
fn logs_are_emitted_in_program_order() {
    // LOG0 over the first 4 bytes of memory, twice with different data.
    let code = vec![
        0x60, 0x11, 0x60, 0x00, 0x53, // MSTORE8(0, 0x11)
        0x60, 0x01, 0x60, 0x00, 0xa0, // LOG0(0, 1)
        0x60, 0x22, 0x60, 0x00, 0x53, // MSTORE8(0, 0x22)
        0x60, 0x01, 0x60, 0x00, 0xa0, // LOG0(0, 1)
        0x00,
    ];
    let (report, _) = run_code(code);

    assert!(report.is_success());
    assert_eq!(report.logs.len(), 2);
    assert_eq!(report.logs[0].address, CONTRACT);
    assert_eq!(&report.logs[0].data[..], &[0x11]);
    assert_eq!(&report.logs[1].data[..], &[0x22]);
}

#[test]
fn log_topics_come_from_the_stack() {
    // PUSH1 7 (topic), PUSH1 0 (len), PUSH1 0 (offset) ... LOG1 pops
    // offset, len, then the topic.
    let code = vec![0x60, 0x07, 0x60, 0x00, 0x60, 0x00, 0xa1, 0x00];
    let (report, _) = run_code(code);

    assert!(report.is_success());
    assert_eq!(report.logs.len(), 1);
    assert_eq!(report.logs[0].topics, vec![H256(word(7).to_big_endian())]);
    assert!(report.logs[0].data.is_empty());
}

// =========================================================================
// Nested calls
// =========================================================================

/// Bytecode returning a single word.
fn return_word_code(value: u8) -> Vec<u8> {
    vec![
        0x60, value, 0x60, 0x00, 0x52, // MSTORE(0, value)
        0x60, 0x20, 0x60, 0x00, 0xf3, // RETURN(0, 32)
    ]
}

/// CALL into `CALLEE` forwarding 0xFFFF gas, then return the child's word.
fn caller_code() -> Vec<u8> {
    let mut code = vec![
        0x60, 0x20, // return_len = 32
        0x60, 0x00, // return_offset = 0
        0x60, 0x00, // args_len = 0
        0x60, 0x00, // args_offset = 0
        0x60, 0x00, // value = 0
        0x73, // PUSH20 callee
    ];
    code.extend_from_slice(CALLEE.as_bytes());
    code.extend_from_slice(&[
        0x61, 0xff, 0xff, // gas = 0xFFFF
        0xf1, // CALL
        0x60, 0x20, 0x60, 0x00, 0xf3, // RETURN(0, 32)
    ]);
    code
}

fn run_call_pair(callee_code: Vec<u8>) -> (ExecutionReport, GeneralizedDatabase) {
    let mut store = InMemoryDatabase::new();
    store.add_account(SENDER, rich_sender());
    store.add_account(
        CONTRACT,
        Account::new(0, U256::zero(), Bytes::from(caller_code())),
    );
    store.add_account(CALLEE, Account::new(0, U256::zero(), Bytes::from(callee_code)));

    let mut db = GeneralizedDatabase::new(Arc::new(store));
    let tx = call_tx(DEFAULT_GAS_LIMIT, vec![], U256::zero());
    let report = VM::new(test_env(DEFAULT_GAS_LIMIT), &mut db, &tx, CallTracer::disabled())
        .execute()
        .unwrap();
    (report, db)
}

#[test]
fn call_returns_child_output_to_parent_memory() {
    let (report, _) = run_call_pair(return_word_code(0x2a));

    assert!(report.is_success());
    assert_eq!(report.output.len(), 32);
    assert_eq!(U256::from_big_endian(&report.output), word(0x2a));
}

#[test]
fn reverted_child_leaves_no_trace_in_parent_state() {
    // Child stores then reverts; parent still succeeds and sees a zero
    // word in its return area.
    let callee = vec![
        0x60, 0x2a, 0x60, 0x00, 0x55, // SSTORE(0, 42)
        0x60, 0x00, 0x60, 0x00, 0xfd, // REVERT(0, 0)
    ];
    let (report, db) = run_call_pair(callee);

    assert!(report.is_success());
    assert_eq!(U256::from_big_endian(&report.output), U256::zero());
    assert_eq!(storage_of(&db, CALLEE, 0), U256::zero());
}

#[test]
fn staticcall_blocks_storage_writes() {
    // Parent STATICCALLs a child that attempts SSTORE; the child fails,
    // the parent stores the 0 result word and returns it.
    let mut parent = vec![
        0x60, 0x00, // return_len = 0
        0x60, 0x00, // return_offset = 0
        0x60, 0x00, // args_len = 0
        0x60, 0x00, // args_offset = 0
        0x73, // PUSH20 callee
    ];
    parent.extend_from_slice(CALLEE.as_bytes());
    parent.extend_from_slice(&[
        0x61, 0xff, 0xff, // gas
        0xfa, // STATICCALL
        0x60, 0x00, 0x52, // MSTORE(0, result)
        0x60, 0x20, 0x60, 0x00, 0xf3, // RETURN(0, 32)
    ]);

    let callee = vec![0x60, 0x01, 0x60, 0x00, 0x55, 0x00]; // SSTORE(0, 1)

    let mut store = InMemoryDatabase::new();
    store.add_account(SENDER, rich_sender());
    store.add_account(CONTRACT, Account::new(0, U256::zero(), Bytes::from(parent)));
    store.add_account(CALLEE, Account::new(0, U256::zero(), Bytes::from(callee)));

    let mut db = GeneralizedDatabase::new(Arc::new(store));
    let tx = call_tx(DEFAULT_GAS_LIMIT, vec![], U256::zero());
    let report = VM::new(test_env(DEFAULT_GAS_LIMIT), &mut db, &tx, CallTracer::disabled())
        .execute()
        .unwrap();

    assert!(report.is_success());
    assert_eq!(U256::from_big_endian(&report.output), U256::zero());
    assert_eq!(storage_of(&db, CALLEE, 0), U256::zero());
}

#[test]
fn delegatecall_runs_callee_code_in_caller_context() {
    // Parent DELEGATECALLs a child that stores 1 at slot 0; the write lands
    // in the parent's storage.
    let mut parent = vec![
        0x60, 0x00, // return_len
        0x60, 0x00, // return_offset
        0x60, 0x00, // args_len
        0x60, 0x00, // args_offset
        0x73, // PUSH20 callee
    ];
    parent.extend_from_slice(CALLEE.as_bytes());
    parent.extend_from_slice(&[0x61, 0xff, 0xff, 0xf4, 0x00]);

    let callee = vec![0x60, 0x01, 0x60, 0x00, 0x55, 0x00]; // SSTORE(0, 1)

    let mut store = InMemoryDatabase::new();
    store.add_account(SENDER, rich_sender());
    store.add_account(CONTRACT, Account::new(0, U256::zero(), Bytes::from(parent)));
    store.add_account(CALLEE, Account::new(0, U256::zero(), Bytes::from(callee)));

    let mut db = GeneralizedDatabase::new(Arc::new(store));
    let tx = call_tx(DEFAULT_GAS_LIMIT, vec![], U256::zero());
    let report = VM::new(test_env(DEFAULT_GAS_LIMIT), &mut db, &tx, CallTracer::disabled())
        .execute()
        .unwrap();

    assert!(report.is_success());
    assert_eq!(storage_of(&db, CONTRACT, 0), U256::one());
    assert_eq!(storage_of(&db, CALLEE, 0), U256::zero());
}

#[test]
fn call_tracer_records_nested_frames() {
    let mut store = InMemoryDatabase::new();
    store.add_account(SENDER, rich_sender());
    store.add_account(
        CONTRACT,
        Account::new(0, U256::zero(), Bytes::from(caller_code())),
    );
    store.add_account(
        CALLEE,
        Account::new(0, U256::zero(), Bytes::from(return_word_code(0x2a))),
    );

    let mut db = GeneralizedDatabase::new(Arc::new(store));
    let tx = call_tx(DEFAULT_GAS_LIMIT, vec![], U256::zero());
    let mut vm = VM::new(
        test_env(DEFAULT_GAS_LIMIT),
        &mut db,
        &tx,
        CallTracer::new(false, true),
    );
    let report = vm.execute().unwrap();

    assert!(report.is_success());
    assert_eq!(vm.tracer.callframes.len(), 1);
    let root = &vm.tracer.callframes[0];
    assert_eq!(root.from, SENDER);
    assert_eq!(root.to, CONTRACT);
    assert_eq!(root.calls.len(), 1);
    assert_eq!(root.calls[0].to, CALLEE);
    assert_eq!(U256::from_big_endian(&root.calls[0].output), word(0x2a));
}

#[test]
fn call_transfers_value_to_callee() {
    // Parent forwards 5 wei to an empty account.
    let mut parent = vec![
        0x60, 0x00, // return_len
        0x60, 0x00, // return_offset
        0x60, 0x00, // args_len
        0x60, 0x00, // args_offset
        0x60, 0x05, // value = 5
        0x73,
    ];
    parent.extend_from_slice(CALLEE.as_bytes());
    parent.extend_from_slice(&[0x61, 0xff, 0xff, 0xf1, 0x00]);

    let mut store = InMemoryDatabase::new();
    store.add_account(SENDER, rich_sender());
    store.add_account(
        CONTRACT,
        Account::new(0, word(100), Bytes::from(parent)),
    );

    let mut db = GeneralizedDatabase::new(Arc::new(store));
    let tx = call_tx(DEFAULT_GAS_LIMIT, vec![], U256::zero());
    let report = VM::new(test_env(DEFAULT_GAS_LIMIT), &mut db, &tx, CallTracer::disabled())
        .execute()
        .unwrap();

    assert!(report.is_success());
    assert_eq!(balance_of(&db, CALLEE), word(5));
    assert_eq!(balance_of(&db, CONTRACT), word(95));
}

// =========================================================================
// Contract creation
// =========================================================================

/// Init code that deploys the single byte `0x00` as runtime code.
fn trivial_init_code() -> Vec<u8> {
    vec![
        0x60, 0x00, 0x60, 0x00, 0x53, // MSTORE8(0, 0)
        0x60, 0x01, 0x60, 0x00, 0xf3, // RETURN(0, 1)
    ]
}

#[test]
fn create_transaction_deploys_code() {
    let mut store = InMemoryDatabase::new();
    store.add_account(SENDER, rich_sender());

    let mut db = GeneralizedDatabase::new(Arc::new(store));
    let tx = Transaction {
        nonce: 0,
        gas_limit: DEFAULT_GAS_LIMIT,
        gas_price: U256::one(),
        to: TxKind::Create,
        value: word(9),
        data: Bytes::from(trivial_init_code()),
    };
    let report = VM::new(test_env(DEFAULT_GAS_LIMIT), &mut db, &tx, CallTracer::disabled())
        .execute()
        .unwrap();

    assert!(report.is_success());

    let created = calculate_create_address(SENDER, 0);
    let account = db.cache.get(&created).expect("created account is cached");
    assert_eq!(&account.code[..], &[0x00]);
    assert_eq!(account.info.nonce, 1);
    assert_eq!(account.info.balance, word(9));
    assert_eq!(db.cache.get(&SENDER).unwrap().info.nonce, 1);
}

#[test]
fn create_transaction_rejects_occupied_address() {
    let created = calculate_create_address(SENDER, 0);

    let mut store = InMemoryDatabase::new();
    store.add_account(SENDER, rich_sender());
    store.add_account(created, Account::new(1, U256::zero(), Bytes::new()));

    let mut db = GeneralizedDatabase::new(Arc::new(store));
    let tx = Transaction {
        nonce: 0,
        gas_limit: DEFAULT_GAS_LIMIT,
        gas_price: U256::one(),
        to: TxKind::Create,
        value: U256::zero(),
        data: Bytes::from(trivial_init_code()),
    };
    let report = VM::new(test_env(DEFAULT_GAS_LIMIT), &mut db, &tx, CallTracer::disabled())
        .execute()
        .unwrap();

    assert!(is_exception(&report));
    assert_eq!(report.gas_used, DEFAULT_GAS_LIMIT);
}

#[test]
fn create_opcode_deploys_and_pushes_address() {
    // Write the init code into memory with MSTORE8s, then CREATE(0, 0, len)
    // and return the pushed address.
    let init = trivial_init_code();
    let mut code = Vec::new();
    for (i, byte) in init.iter().enumerate() {
        code.extend_from_slice(&[0x60, *byte, 0x60, i as u8, 0x53]);
    }
    code.extend_from_slice(&[
        0x60, init.len() as u8, // size
        0x60, 0x00, // offset
        0x60, 0x00, // value
        0xf0, // CREATE
        0x60, 0x00, 0x52, // MSTORE(0, address)
        0x60, 0x20, 0x60, 0x00, 0xf3, // RETURN(0, 32)
    ]);

    let (report, db) = run_code(code);

    assert!(report.is_success());
    let created = calculate_create_address(CONTRACT, 0);
    let pushed = Address::from_slice(&report.output[12..]);
    assert_eq!(pushed, created);
    assert_eq!(&db.cache.get(&created).unwrap().code[..], &[0x00]);
    // The deployer's nonce moved even though it is a contract.
    assert_eq!(db.cache.get(&CONTRACT).unwrap().info.nonce, 1);
}

// =========================================================================
// Transaction validation
// =========================================================================

#[test]
fn invalid_nonce_is_rejected() {
    let mut store = InMemoryDatabase::new();
    store.add_account(SENDER, rich_sender());
    store.add_account(CONTRACT, Account::new(0, U256::zero(), Bytes::new()));

    let mut db = GeneralizedDatabase::new(Arc::new(store));
    let mut tx = call_tx(DEFAULT_GAS_LIMIT, vec![], U256::zero());
    tx.nonce = 5;

    let err = VM::new(test_env(DEFAULT_GAS_LIMIT), &mut db, &tx, CallTracer::disabled())
        .execute()
        .unwrap_err();
    assert_eq!(
        err,
        VMError::TxValidation(TxValidationError::InvalidNonce {
            expected: 0,
            actual: 5
        })
    );
}

#[test]
fn intrinsic_gas_too_low_is_rejected() {
    let mut store = InMemoryDatabase::new();
    store.add_account(SENDER, rich_sender());
    store.add_account(CONTRACT, Account::new(0, U256::zero(), Bytes::new()));

    let mut db = GeneralizedDatabase::new(Arc::new(store));
    let tx = call_tx(20_000, vec![], U256::zero());

    let err = VM::new(test_env(20_000), &mut db, &tx, CallTracer::disabled())
        .execute()
        .unwrap_err();
    assert_eq!(
        err,
        VMError::TxValidation(TxValidationError::IntrinsicGasTooLow)
    );
}

#[test]
fn insufficient_funds_is_rejected() {
    let mut store = InMemoryDatabase::new();
    store.add_account(SENDER, Account::new(0, word(1000), Bytes::new()));
    store.add_account(CONTRACT, Account::new(0, U256::zero(), Bytes::new()));

    let mut db = GeneralizedDatabase::new(Arc::new(store));
    let tx = call_tx(DEFAULT_GAS_LIMIT, vec![], U256::zero());

    let err = VM::new(test_env(DEFAULT_GAS_LIMIT), &mut db, &tx, CallTracer::disabled())
        .execute()
        .unwrap_err();
    assert_eq!(
        err,
        VMError::TxValidation(TxValidationError::InsufficientAccountFunds)
    );
}

#[test]
fn calldata_bytes_are_part_of_intrinsic_gas() {
    // One non-zero and one zero byte on top of an empty STOP contract:
    // 21000 + 16 + 4.
    let (report, _) = run_code_with_calldata(vec![0x00], vec![0xff, 0x00], DEFAULT_GAS_LIMIT);
    assert!(report.is_success());
    assert_eq!(report.gas_used, 21_020);
}
