//! # System operations
//!
//! Includes the following opcodes:
//!   - `CALL`
//!   - `CALLCODE`
//!   - `DELEGATECALL`
//!   - `STATICCALL`
//!   - `RETURN`
//!   - `CREATE`
//!   - `CREATE2`
//!   - `SELFDESTRUCT`
//!   - `REVERT`

use crate::{
    call_frame::CallFrame,
    constants::{FAIL, INIT_CODE_MAX_SIZE, MAX_CALL_DEPTH, SUCCESS},
    errors::{ContextResult, ExceptionalHalt, InternalError, OpcodeResult, TxResult, VMError},
    gas_cost,
    memory::calculate_memory_size,
    opcode_handlers::OpcodeHandler,
    opcodes::Opcode,
    utils::{
        address_to_word, calculate_create2_address, calculate_create_address, size_offset_to_usize,
        word_to_address,
    },
    vm::VM,
};
use bytes::Bytes;
use ethereum_types::{Address, U256};

pub struct OpCallHandler;
impl OpcodeHandler for OpCallHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [gas, callee, value, args_offset, args_len, return_offset, return_len] =
            *vm.current_call_frame.stack.pop()?;
        let callee = word_to_address(callee);
        let (args_len, args_offset) = size_offset_to_usize(args_len, args_offset)?;
        let (return_len, return_offset) = size_offset_to_usize(return_len, return_offset)?;

        // A static frame may call, but not move value.
        if vm.current_call_frame.is_static && !value.is_zero() {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }

        let (new_memory_size, address_is_empty, address_was_cold) =
            vm.get_call_gas_params(args_offset, args_len, return_offset, return_len, callee)?;
        let (gas_cost, gas_limit) = gas_cost::call(
            new_memory_size,
            vm.current_call_frame.memory.len(),
            address_was_cold,
            address_is_empty,
            value,
            gas,
            vm.current_call_frame.gas_remaining(),
        )?;
        vm.current_call_frame.increase_consumed_gas(gas_cost)?;

        // Expand memory upfront: the parent's buffer must already cover the
        // return area when the child's output is copied back.
        vm.current_call_frame.memory.resize(new_memory_size)?;

        let data = vm.current_call_frame.memory.load_range(args_offset, args_len)?;
        let bytecode = vm.db.get_account(callee)?.code.clone();

        vm.tracer.enter(
            Opcode::CALL,
            vm.current_call_frame.to,
            callee,
            value,
            gas_limit,
            data.clone(),
        );

        vm.generic_call(
            gas_limit,
            value,
            vm.current_call_frame.to,
            callee,
            callee,
            true,
            vm.current_call_frame.is_static,
            data,
            return_offset,
            return_len,
            bytecode,
        )
    }
}

pub struct OpCallCodeHandler;
impl OpcodeHandler for OpCallCodeHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [gas, address, value, args_offset, args_len, return_offset, return_len] =
            *vm.current_call_frame.stack.pop()?;
        let address = word_to_address(address);
        let (args_len, args_offset) = size_offset_to_usize(args_len, args_offset)?;
        let (return_len, return_offset) = size_offset_to_usize(return_len, return_offset)?;

        let (new_memory_size, _, address_was_cold) =
            vm.get_call_gas_params(args_offset, args_len, return_offset, return_len, address)?;
        let (gas_cost, gas_limit) = gas_cost::callcode(
            new_memory_size,
            vm.current_call_frame.memory.len(),
            address_was_cold,
            value,
            gas,
            vm.current_call_frame.gas_remaining(),
        )?;
        vm.current_call_frame.increase_consumed_gas(gas_cost)?;

        vm.current_call_frame.memory.resize(new_memory_size)?;

        let data = vm.current_call_frame.memory.load_range(args_offset, args_len)?;
        let bytecode = vm.db.get_account(address)?.code.clone();

        vm.tracer.enter(
            Opcode::CALLCODE,
            vm.current_call_frame.to,
            vm.current_call_frame.to,
            value,
            gas_limit,
            data.clone(),
        );

        // Runs the callee's code in the caller's context.
        vm.generic_call(
            gas_limit,
            value,
            vm.current_call_frame.to,
            vm.current_call_frame.to,
            address,
            true,
            vm.current_call_frame.is_static,
            data,
            return_offset,
            return_len,
            bytecode,
        )
    }
}

pub struct OpDelegateCallHandler;
impl OpcodeHandler for OpDelegateCallHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [gas, address, args_offset, args_len, return_offset, return_len] =
            *vm.current_call_frame.stack.pop()?;
        let address = word_to_address(address);
        let (args_len, args_offset) = size_offset_to_usize(args_len, args_offset)?;
        let (return_len, return_offset) = size_offset_to_usize(return_len, return_offset)?;

        let (new_memory_size, _, address_was_cold) =
            vm.get_call_gas_params(args_offset, args_len, return_offset, return_len, address)?;
        let (gas_cost, gas_limit) = gas_cost::delegatecall(
            new_memory_size,
            vm.current_call_frame.memory.len(),
            address_was_cold,
            gas,
            vm.current_call_frame.gas_remaining(),
        )?;
        vm.current_call_frame.increase_consumed_gas(gas_cost)?;

        vm.current_call_frame.memory.resize(new_memory_size)?;

        let data = vm.current_call_frame.memory.load_range(args_offset, args_len)?;
        let bytecode = vm.db.get_account(address)?.code.clone();

        vm.tracer.enter(
            Opcode::DELEGATECALL,
            vm.current_call_frame.msg_sender,
            vm.current_call_frame.to,
            vm.current_call_frame.msg_value,
            gas_limit,
            data.clone(),
        );

        // Keeps caller and value of the current frame.
        vm.generic_call(
            gas_limit,
            vm.current_call_frame.msg_value,
            vm.current_call_frame.msg_sender,
            vm.current_call_frame.to,
            address,
            false,
            vm.current_call_frame.is_static,
            data,
            return_offset,
            return_len,
            bytecode,
        )
    }
}

pub struct OpStaticCallHandler;
impl OpcodeHandler for OpStaticCallHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [gas, address, args_offset, args_len, return_offset, return_len] =
            *vm.current_call_frame.stack.pop()?;
        let address = word_to_address(address);
        let (args_len, args_offset) = size_offset_to_usize(args_len, args_offset)?;
        let (return_len, return_offset) = size_offset_to_usize(return_len, return_offset)?;

        let (new_memory_size, _, address_was_cold) =
            vm.get_call_gas_params(args_offset, args_len, return_offset, return_len, address)?;
        let (gas_cost, gas_limit) = gas_cost::staticcall(
            new_memory_size,
            vm.current_call_frame.memory.len(),
            address_was_cold,
            gas,
            vm.current_call_frame.gas_remaining(),
        )?;
        vm.current_call_frame.increase_consumed_gas(gas_cost)?;

        vm.current_call_frame.memory.resize(new_memory_size)?;

        let data = vm.current_call_frame.memory.load_range(args_offset, args_len)?;
        let bytecode = vm.db.get_account(address)?.code.clone();

        vm.tracer.enter(
            Opcode::STATICCALL,
            vm.current_call_frame.to,
            address,
            U256::zero(),
            gas_limit,
            data.clone(),
        );

        // The static flag propagates to every nested call.
        vm.generic_call(
            gas_limit,
            U256::zero(),
            vm.current_call_frame.to,
            address,
            address,
            false,
            true,
            data,
            return_offset,
            return_len,
            bytecode,
        )
    }
}

pub struct OpReturnHandler;
impl OpcodeHandler for OpReturnHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [offset, len] = *vm.current_call_frame.stack.pop()?;
        let (len, offset) = size_offset_to_usize(len, offset)?;

        vm.current_call_frame
            .increase_consumed_gas(gas_cost::exit_opcode(
                calculate_memory_size(offset, len)?,
                vm.current_call_frame.memory.len(),
            )?)?;

        if len != 0 {
            vm.current_call_frame.output = vm.current_call_frame.memory.load_range(offset, len)?;
        }

        Ok(OpcodeResult::Halt)
    }
}

pub struct OpRevertHandler;
impl OpcodeHandler for OpRevertHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [offset, len] = *vm.current_call_frame.stack.pop()?;
        let (len, offset) = size_offset_to_usize(len, offset)?;

        vm.current_call_frame
            .increase_consumed_gas(gas_cost::exit_opcode(
                calculate_memory_size(offset, len)?,
                vm.current_call_frame.memory.len(),
            )?)?;

        if len != 0 {
            vm.current_call_frame.output = vm.current_call_frame.memory.load_range(offset, len)?;
        }

        Err(VMError::RevertOpcode)
    }
}

pub struct OpCreateHandler;
impl OpcodeHandler for OpCreateHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [value_in_wei, code_offset, code_len] = *vm.current_call_frame.stack.pop()?;
        let (code_len, code_offset) = size_offset_to_usize(code_len, code_offset)?;

        vm.current_call_frame
            .increase_consumed_gas(gas_cost::create(
                calculate_memory_size(code_offset, code_len)?,
                vm.current_call_frame.memory.len(),
                code_len,
            )?)?;

        vm.generic_create(value_in_wei, code_offset, code_len, None)
    }
}

pub struct OpCreate2Handler;
impl OpcodeHandler for OpCreate2Handler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [value_in_wei, code_offset, code_len, salt] = *vm.current_call_frame.stack.pop()?;
        let (code_len, code_offset) = size_offset_to_usize(code_len, code_offset)?;

        vm.current_call_frame
            .increase_consumed_gas(gas_cost::create_2(
                calculate_memory_size(code_offset, code_len)?,
                vm.current_call_frame.memory.len(),
                code_len,
            )?)?;

        vm.generic_create(value_in_wei, code_offset, code_len, Some(salt))
    }
}

pub struct OpSelfDestructHandler;
impl OpcodeHandler for OpSelfDestructHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        if vm.current_call_frame.is_static {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }

        let beneficiary = word_to_address(vm.current_call_frame.stack.pop1()?);

        let balance = vm.db.get_account(vm.current_call_frame.to)?.info.balance;
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::selfdestruct(
                vm.substate.add_accessed_address(beneficiary),
                vm.db.get_account(beneficiary)?.is_empty(),
                balance,
            )?)?;

        // Since Cancun the account is only removed when it was created in
        // this very transaction; otherwise the balance just moves.
        vm.transfer(vm.current_call_frame.to, beneficiary, balance)?;
        if vm.substate.is_account_created(&vm.current_call_frame.to) {
            // When the beneficiary is the destroyed account itself, the
            // ether is burnt.
            vm.substate.add_selfdestruct(vm.current_call_frame.to);
            vm.get_account_mut(vm.current_call_frame.to)?.info.balance = U256::zero();
        }

        vm.tracer.enter(
            Opcode::SELFDESTRUCT,
            vm.current_call_frame.to,
            beneficiary,
            balance,
            0,
            Bytes::new(),
        );
        vm.tracer.exit_early(0, None)?;

        Ok(OpcodeResult::Halt)
    }
}

impl<'a> VM<'a> {
    /// Common behavior for the CREATE and CREATE2 opcodes.
    pub fn generic_create(
        &mut self,
        value: U256,
        code_offset_in_memory: usize,
        code_size_in_memory: usize,
        salt: Option<U256>,
    ) -> Result<OpcodeResult, VMError> {
        // [EIP-3860] - the init code size is capped.
        if code_size_in_memory > INIT_CODE_MAX_SIZE {
            return Err(ExceptionalHalt::OutOfGas.into());
        }

        if self.current_call_frame.is_static {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }

        self.current_call_frame.sub_return_data = Bytes::new();

        // The child runs on all but one 64th of the remaining gas, reserved
        // here and returned when it finishes.
        let gas_limit = gas_cost::max_message_call_gas(self.current_call_frame.gas_remaining());
        self.current_call_frame.increase_consumed_gas(gas_limit)?;

        let code = self
            .current_call_frame
            .memory
            .load_range(code_offset_in_memory, code_size_in_memory)?;

        let deployer = self.current_call_frame.to;
        let (deployer_balance, deployer_nonce) = {
            let deployer_account = self.db.get_account(deployer)?;
            (deployer_account.info.balance, deployer_account.info.nonce)
        };

        let new_address = match salt {
            Some(salt) => calculate_create2_address(deployer, &code, salt),
            None => calculate_create_address(deployer, deployer_nonce),
        };

        self.substate.add_accessed_address(new_address);

        let call_type = match salt {
            Some(_) => Opcode::CREATE2,
            None => Opcode::CREATE,
        };
        self.tracer
            .enter(call_type, deployer, new_address, value, gas_limit, code.clone());

        let new_depth = self
            .current_call_frame
            .depth
            .checked_add(1)
            .ok_or(InternalError::Overflow)?;

        // Failures that push 0 and return the reserved gas to the deployer.
        let checks = [
            (deployer_balance < value, "OutOfFund"),
            (new_depth > MAX_CALL_DEPTH, "MaxDepth"),
            (deployer_nonce == u64::MAX, "MaxNonce"),
        ];
        for (condition, reason) in checks {
            if condition {
                self.early_revert_message_call(gas_limit, reason.to_string())?;
                return Ok(OpcodeResult::Continue);
            }
        }

        // Irreversible, even if the deployment fails afterwards.
        self.increment_account_nonce(deployer)?;

        // Deployment fails, consuming the reserved gas, when the target
        // address is already occupied.
        if self.db.get_account(new_address)?.has_code_or_nonce() {
            self.current_call_frame.stack.push1(FAIL)?;
            self.tracer
                .exit_early(gas_limit, Some("CreateAccExists".to_string()))?;
            return Ok(OpcodeResult::Continue);
        }

        let mut stack = self.stack_pool.pop().unwrap_or_default();
        stack.clear();

        let new_call_frame = CallFrame::new(
            deployer,
            new_address,
            new_address,
            code,
            value,
            Bytes::new(),
            false,
            gas_limit,
            new_depth,
            true,
            0,
            0,
            stack,
        );
        self.add_callframe(new_call_frame);

        // These revert with the child frame if the init code fails.
        self.increment_account_nonce(new_address)?;
        self.transfer(deployer, new_address, value)?;

        self.backup_substate();
        self.substate.add_created_account(new_address);

        Ok(OpcodeResult::Continue)
    }

    /// Common behavior of the CALL-family opcodes: validates the transfer,
    /// spawns the child frame and moves the value.
    #[allow(clippy::too_many_arguments)]
    #[inline(always)]
    pub fn generic_call(
        &mut self,
        gas_limit: u64,
        value: U256,
        msg_sender: Address,
        to: Address,
        code_address: Address,
        should_transfer_value: bool,
        is_static: bool,
        calldata: Bytes,
        ret_offset: usize,
        ret_size: usize,
        bytecode: Bytes,
    ) -> Result<OpcodeResult, VMError> {
        self.current_call_frame.sub_return_data = Bytes::new();

        // Not enough balance for the transfer: push 0 and hand the gas back.
        if should_transfer_value && !value.is_zero() {
            let sender_balance = self.db.get_account(msg_sender)?.info.balance;
            if sender_balance < value {
                self.early_revert_message_call(gas_limit, "OutOfFund".to_string())?;
                return Ok(OpcodeResult::Continue);
            }
        }

        let new_depth = self
            .current_call_frame
            .depth
            .checked_add(1)
            .ok_or(InternalError::Overflow)?;
        if new_depth > MAX_CALL_DEPTH {
            self.early_revert_message_call(gas_limit, "MaxDepth".to_string())?;
            return Ok(OpcodeResult::Continue);
        }

        let mut stack = self.stack_pool.pop().unwrap_or_default();
        stack.clear();

        let new_call_frame = CallFrame::new(
            msg_sender,
            to,
            code_address,
            bytecode,
            value,
            calldata,
            is_static,
            gas_limit,
            new_depth,
            false,
            ret_offset,
            ret_size,
            stack,
        );
        self.add_callframe(new_call_frame);

        if should_transfer_value {
            self.transfer(msg_sender, to, value)?;
        }

        self.backup_substate();

        Ok(OpcodeResult::Continue)
    }

    /// Commits or discards the substate and journal of the innermost frame,
    /// depending on the outcome.
    pub fn handle_state_backup(&mut self, ctx_result: &ContextResult) -> Result<(), VMError> {
        if ctx_result.is_success() {
            self.commit_substate_backup()?;
        } else {
            self.revert_substate_backup()?;
            self.restore_cache_state()?;
        }

        Ok(())
    }

    /// Handles the interaction between a finished child frame and its parent.
    pub fn handle_return(&mut self, ctx_result: &ContextResult) -> Result<(), VMError> {
        self.handle_state_backup(ctx_result)?;
        let executed_call_frame = self.pop_call_frame()?;

        if executed_call_frame.is_create {
            self.handle_return_create(executed_call_frame, ctx_result)?;
        } else {
            self.handle_return_call(executed_call_frame, ctx_result)?;
        }

        Ok(())
    }

    fn handle_return_call(
        &mut self,
        executed_call_frame: CallFrame,
        ctx_result: &ContextResult,
    ) -> Result<(), VMError> {
        let CallFrame {
            gas_limit,
            ret_offset,
            ret_size,
            ..
        } = executed_call_frame;

        // Return gas left from the subcontext.
        let child_unused_gas = gas_limit
            .checked_sub(ctx_result.gas_used)
            .ok_or(InternalError::Underflow)?;
        self.current_call_frame.gas_used = self
            .current_call_frame
            .gas_used
            .checked_sub(child_unused_gas)
            .ok_or(InternalError::Underflow)?;

        // Store the child's output into the parent's return area.
        let return_data = if ctx_result.output.len() >= ret_size {
            ctx_result
                .output
                .get(..ret_size)
                .ok_or(ExceptionalHalt::OutOfBounds)?
        } else {
            &ctx_result.output
        };
        self.current_call_frame
            .memory
            .store_data(ret_offset, return_data)?;
        self.current_call_frame.sub_return_data = ctx_result.output.clone();

        match &ctx_result.result {
            TxResult::Success => {
                self.current_call_frame.stack.push1(SUCCESS)?;
                self.merge_call_frame_backup_with_parent(&executed_call_frame.call_frame_backup)?;
            }
            TxResult::Revert(_) => {
                self.current_call_frame.stack.push1(FAIL)?;
            }
        };

        self.tracer.exit_context(ctx_result, false)?;

        let mut stack = executed_call_frame.stack;
        stack.clear();
        self.stack_pool.push(stack);

        Ok(())
    }

    fn handle_return_create(
        &mut self,
        executed_call_frame: CallFrame,
        ctx_result: &ContextResult,
    ) -> Result<(), VMError> {
        let CallFrame {
            gas_limit, to, ..
        } = executed_call_frame;

        // Return unused gas to the deployer.
        let unused_gas = gas_limit
            .checked_sub(ctx_result.gas_used)
            .ok_or(InternalError::Underflow)?;
        self.current_call_frame.gas_used = self
            .current_call_frame
            .gas_used
            .checked_sub(unused_gas)
            .ok_or(InternalError::Underflow)?;

        match &ctx_result.result {
            TxResult::Success => {
                self.current_call_frame.stack.push1(address_to_word(to))?;
                self.merge_call_frame_backup_with_parent(&executed_call_frame.call_frame_backup)?;
            }
            TxResult::Revert(err) => {
                // Only an explicit REVERT carries return data out of a
                // failed deployment.
                if err.is_revert_opcode() {
                    self.current_call_frame.sub_return_data = ctx_result.output.clone();
                }

                self.current_call_frame.stack.push1(FAIL)?;
            }
        };

        self.tracer.exit_context(ctx_result, false)?;

        let mut stack = executed_call_frame.stack;
        stack.clear();
        self.stack_pool.push(stack);

        Ok(())
    }

    /// Values needed by the CALL-family opcodes to compute their total cost.
    fn get_call_gas_params(
        &mut self,
        args_offset: usize,
        args_size: usize,
        return_data_offset: usize,
        return_data_size: usize,
        address: Address,
    ) -> Result<(usize, bool, bool), VMError> {
        let address_was_cold = self.substate.add_accessed_address(address);
        let account_is_empty = self.db.get_account(address)?.is_empty();

        let new_memory_size_for_args = calculate_memory_size(args_offset, args_size)?;
        let new_memory_size_for_return_data =
            calculate_memory_size(return_data_offset, return_data_size)?;
        let new_memory_size = new_memory_size_for_args.max(new_memory_size_for_return_data);

        Ok((new_memory_size, account_is_empty, address_was_cold))
    }

    /// A call that fails before spawning a frame: the reserved gas flows
    /// back and the failure is reported as a 0 on the stack.
    fn early_revert_message_call(&mut self, gas_limit: u64, reason: String) -> Result<(), VMError> {
        let callframe = &mut self.current_call_frame;

        callframe.gas_used = callframe
            .gas_used
            .checked_sub(gas_limit)
            .ok_or(InternalError::Underflow)?;
        callframe.stack.push1(FAIL)?;

        self.tracer.exit_early(0, Some(reason))?;
        Ok(())
    }
}
