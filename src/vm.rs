use crate::{
    call_frame::CallFrame,
    db::gen_db::GeneralizedDatabase,
    environment::{Environment, Transaction},
    errors::{
        ContextResult, ExceptionalHalt, ExecutionReport, InternalError, OpcodeResult, TxResult,
        VMError,
    },
    hooks::{DefaultHook, Hook},
    opcodes::{Opcode, OPCODE_TABLE},
    stack::Stack,
    tracing::CallTracer,
};
use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
};

/// An event emitted by the LOG opcodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
}

/// Information accrued during transaction execution: warm addresses and
/// slots, emitted logs, scheduled destructions and the refund counter.
///
/// Snapshotted once per call frame so a reverting frame discards exactly its
/// own additions.
#[derive(Debug, Clone, Default)]
pub struct Substate {
    pub accessed_addresses: HashSet<Address>,
    pub accessed_storage_slots: FxHashMap<Address, BTreeSet<H256>>,
    pub created_accounts: HashSet<Address>,
    pub selfdestruct_set: HashSet<Address>,
    pub refunded_gas: u64,
    pub logs: Vec<Log>,
}

impl Substate {
    /// Marks an address warm. Returns whether it was cold before.
    pub fn add_accessed_address(&mut self, address: Address) -> bool {
        self.accessed_addresses.insert(address)
    }

    pub fn add_log(&mut self, log: Log) {
        self.logs.push(log);
    }

    pub fn add_created_account(&mut self, address: Address) {
        self.created_accounts.insert(address);
    }

    pub fn is_account_created(&self, address: &Address) -> bool {
        self.created_accounts.contains(address)
    }

    pub fn add_selfdestruct(&mut self, address: Address) {
        self.selfdestruct_set.insert(address);
    }
}

/// The execution engine: drives one external transaction through the opcode
/// loop, managing the frame stack, the accrued substate and the journaled
/// world state.
pub struct VM<'a> {
    /// Parents of the currently executing frame, outermost first.
    pub call_frames: Vec<CallFrame>,
    pub current_call_frame: CallFrame,
    pub env: Environment,
    pub substate: Substate,
    pub substate_backups: Vec<Substate>,
    pub db: &'a mut GeneralizedDatabase,
    pub tx: Transaction,
    pub hooks: Vec<Arc<dyn Hook>>,
    /// Storage values at transaction start, for SSTORE gas accounting.
    pub storage_original_values: FxHashMap<Address, FxHashMap<H256, U256>>,
    pub tracer: CallTracer,
    /// Finished frames donate their stacks here so nested calls reuse the
    /// allocation.
    pub stack_pool: Vec<Stack>,
}

impl<'a> VM<'a> {
    pub fn new(
        env: Environment,
        db: &'a mut GeneralizedDatabase,
        tx: &Transaction,
        tracer: CallTracer,
    ) -> Self {
        Self {
            call_frames: vec![],
            current_call_frame: CallFrame::default(),
            env,
            substate: Substate::default(),
            substate_backups: vec![],
            db,
            tx: tx.clone(),
            hooks: vec![Arc::new(DefaultHook)],
            storage_original_values: FxHashMap::default(),
            tracer,
            stack_pool: vec![],
        }
    }

    /// Creates the initial call frame. Callee and bytecode are resolved at
    /// the end of `prepare_execution`.
    fn setup_vm(&mut self) -> Result<(), VMError> {
        let initial_call_frame = CallFrame::new(
            self.env.origin,
            Address::default(),
            Address::default(),
            Bytes::new(),
            self.tx.value,
            self.tx.data.clone(),
            false,
            self.env.gas_limit,
            0,
            false,
            0,
            0,
            Stack::default(),
        );

        self.current_call_frame = initial_call_frame;

        Ok(())
    }

    /// True if the external transaction is a contract creation.
    pub fn is_create(&self) -> bool {
        self.tx.is_create()
    }

    /// Executes a whole external transaction, performing validations at the
    /// beginning and fee settlement at the end.
    pub fn execute(&mut self) -> Result<ExecutionReport, VMError> {
        self.setup_vm()?;

        let call_type = if self.is_create() {
            Opcode::CREATE
        } else {
            Opcode::CALL
        };

        if let Err(e) = self.prepare_execution() {
            // The transaction is invalid; no state change survives.
            self.restore_cache_state()?;
            return Err(e);
        }

        self.tracer.enter(
            call_type,
            self.env.origin,
            self.current_call_frame.to,
            self.tx.value,
            self.env.gas_limit,
            self.tx.data.clone(),
        );

        // Changes made during preparation are written in stone: the nonce
        // bump and the gas pre-payment survive a revert.
        self.current_call_frame.call_frame_backup.clear();

        if self.is_create() {
            // Creating over an occupied address reverts the whole
            // transaction, consuming all gas.
            if let Some(ctx_result) = self.handle_create_transaction()? {
                let mut report = self.build_report(ctx_result)?;
                self.finalize_execution(&mut report)?;
                return Ok(report);
            }
        }

        self.backup_substate();
        let ctx_result = self.run_execution()?;

        let mut report = self.build_report(ctx_result)?;
        self.finalize_execution(&mut report)?;

        tracing::debug!(
            success = report.is_success(),
            gas_used = report.gas_used,
            "transaction executed"
        );

        Ok(report)
    }

    /// Main execution loop: fetch, dispatch, and unwind frames as they halt.
    pub fn run_execution(&mut self) -> Result<ContextResult, VMError> {
        loop {
            let opcode = self.current_call_frame.next_opcode();

            let op_result = self.execute_opcode(opcode);

            let ctx_result = match op_result {
                Ok(OpcodeResult::Continue) => continue,
                Ok(OpcodeResult::Halt) => self.handle_opcode_result()?,
                Err(error) => self.handle_opcode_error(error)?,
            };

            // The initial frame's result is the transaction's result.
            if self.is_initial_call_frame() {
                self.handle_state_backup(&ctx_result)?;
                return Ok(ctx_result);
            }

            self.handle_return(&ctx_result)?;
        }
    }

    #[inline(always)]
    fn execute_opcode(&mut self, opcode: u8) -> Result<OpcodeResult, VMError> {
        OPCODE_TABLE[usize::from(opcode)].call(self)
    }

    /// Executes without keeping any changes to the cached world state.
    pub fn stateless_execute(&mut self) -> Result<ExecutionReport, VMError> {
        let cache_backup = self.db.cache.clone();
        let report = self.execute()?;
        self.db.cache = cache_backup;
        Ok(report)
    }

    /// Rejects a create transaction whose target address is occupied, and
    /// otherwise brings the new account to life.
    fn handle_create_transaction(&mut self) -> Result<Option<ContextResult>, VMError> {
        let new_contract_address = self.current_call_frame.to;

        if self.db.get_account(new_contract_address)?.has_code_or_nonce() {
            return Ok(Some(ContextResult {
                result: TxResult::Revert(ExceptionalHalt::AddressAlreadyOccupied.into()),
                gas_used: self.env.gas_limit,
                output: Bytes::new(),
            }));
        }

        self.increment_account_nonce(new_contract_address)?;
        self.substate.add_created_account(new_contract_address);

        Ok(None)
    }

    fn build_report(&mut self, ctx_result: ContextResult) -> Result<ExecutionReport, VMError> {
        self.tracer.exit_context(&ctx_result, true)?;

        Ok(ExecutionReport {
            result: ctx_result.result,
            gas_used: ctx_result.gas_used,
            gas_refunded: 0,
            output: ctx_result.output,
            logs: std::mem::take(&mut self.substate.logs),
        })
    }

    fn prepare_execution(&mut self) -> Result<(), VMError> {
        for hook in self.hooks.clone() {
            hook.prepare_execution(self)?;
        }
        Ok(())
    }

    fn finalize_execution(&mut self, report: &mut ExecutionReport) -> Result<(), VMError> {
        for hook in self.hooks.clone() {
            hook.finalize_execution(self, report)?;
        }
        Ok(())
    }

    // ================= Frame stack management =========================

    /// Pushes the current frame onto the parent stack and makes `frame` the
    /// executing one.
    pub fn add_callframe(&mut self, frame: CallFrame) {
        let parent = std::mem::replace(&mut self.current_call_frame, frame);
        self.call_frames.push(parent);
    }

    /// Replaces the executing frame with its parent, returning the finished
    /// child.
    pub fn pop_call_frame(&mut self) -> Result<CallFrame, VMError> {
        let parent = self
            .call_frames
            .pop()
            .ok_or(InternalError::CouldNotPopCallframe)?;
        Ok(std::mem::replace(&mut self.current_call_frame, parent))
    }

    pub fn is_initial_call_frame(&self) -> bool {
        self.call_frames.is_empty()
    }

    // ================= Substate checkpoints ===========================

    pub fn backup_substate(&mut self) {
        self.substate_backups.push(self.substate.clone());
    }

    /// The frame succeeded: its substate additions stay.
    pub fn commit_substate_backup(&mut self) -> Result<(), VMError> {
        self.substate_backups
            .pop()
            .ok_or(InternalError::CouldNotPopSubstateBackup)?;
        Ok(())
    }

    /// The frame failed: roll the substate back to the frame's entry point.
    pub fn revert_substate_backup(&mut self) -> Result<(), VMError> {
        self.substate = self
            .substate_backups
            .pop()
            .ok_or(InternalError::CouldNotPopSubstateBackup)?;
        Ok(())
    }
}
