use crate::{
    constants::{TX_BASE_COST, TX_CREATE_GAS},
    environment::TxKind,
    errors::{ExecutionReport, InternalError, TxValidationError, VMError},
    gas_cost,
    hooks::hook::Hook,
    utils::calculate_create_address,
    vm::VM,
};
use bytes::Bytes;
use ethereum_types::U256;

/// Mainnet transaction semantics: nonce and funds validation, intrinsic gas,
/// gas pre-payment, sender nonce bump and value transfer up front; refunds,
/// fee payment and selfdestruct cleanup afterwards.
pub struct DefaultHook;

impl Hook for DefaultHook {
    fn prepare_execution(&self, vm: &mut VM<'_>) -> Result<(), VMError> {
        validate_sender_nonce(vm)?;
        validate_gas_allowance(vm)?;
        add_intrinsic_gas(vm)?;
        deduct_caller(vm)?;

        let sender = vm.env.origin;
        vm.increment_account_nonce(sender)?;

        set_bytecode_and_callee(vm)?;
        transfer_value(vm)?;

        Ok(())
    }

    fn finalize_execution(
        &self,
        vm: &mut VM<'_>,
        report: &mut ExecutionReport,
    ) -> Result<(), VMError> {
        if !report.is_success() {
            undo_value_transfer(vm)?;
        }

        let refunded = compute_gas_refunded(vm, report.gas_used);
        report.gas_used = report
            .gas_used
            .checked_sub(refunded)
            .ok_or(InternalError::Underflow)?;
        report.gas_refunded = refunded;

        refund_sender(vm, report.gas_used)?;
        pay_coinbase(vm, report.gas_used)?;
        delete_self_destruct_accounts(vm)?;

        Ok(())
    }
}

/// The transaction nonce must match the sender account exactly.
fn validate_sender_nonce(vm: &mut VM<'_>) -> Result<(), VMError> {
    let sender_nonce = vm.db.get_account(vm.env.origin)?.info.nonce;
    if sender_nonce != vm.tx.nonce {
        return Err(TxValidationError::InvalidNonce {
            expected: sender_nonce,
            actual: vm.tx.nonce,
        }
        .into());
    }
    Ok(())
}

/// The transaction may not ask for more gas than the block allows.
fn validate_gas_allowance(vm: &mut VM<'_>) -> Result<(), VMError> {
    if vm.tx.gas_limit > vm.env.block_gas_limit {
        return Err(TxValidationError::GasAllowanceExceeded {
            tx_gas_limit: vm.tx.gas_limit,
            block_gas_limit: vm.env.block_gas_limit,
        }
        .into());
    }
    Ok(())
}

/// Charges the flat transaction cost plus the per-byte calldata cost (and
/// the creation surcharge) against the initial frame's budget.
pub fn add_intrinsic_gas(vm: &mut VM<'_>) -> Result<(), VMError> {
    let mut intrinsic_gas = TX_BASE_COST
        .checked_add(gas_cost::tx_calldata(&vm.tx.data)?)
        .ok_or(InternalError::Overflow)?;

    if vm.tx.is_create() {
        intrinsic_gas = intrinsic_gas
            .checked_add(TX_CREATE_GAS)
            .ok_or(InternalError::Overflow)?;
    }

    vm.current_call_frame
        .increase_consumed_gas(intrinsic_gas)
        .map_err(|_| TxValidationError::IntrinsicGasTooLow)?;

    Ok(())
}

/// Validates the sender can cover `gas_limit * gas_price + value`, then
/// collects the gas pre-payment. Unused gas flows back in
/// [`refund_sender`].
fn deduct_caller(vm: &mut VM<'_>) -> Result<(), VMError> {
    let prepaid_gas = U256::from(vm.tx.gas_limit)
        .checked_mul(vm.tx.gas_price)
        .ok_or(TxValidationError::GasLimitPriceProductOverflow)?;

    let up_front_cost = prepaid_gas
        .checked_add(vm.tx.value)
        .ok_or(TxValidationError::GasLimitPriceProductOverflow)?;

    let sender = vm.env.origin;
    if vm.db.get_account(sender)?.info.balance < up_front_cost {
        return Err(TxValidationError::InsufficientAccountFunds.into());
    }

    vm.decrease_account_balance(sender, prepaid_gas)?;

    Ok(())
}

/// Resolves the callee of the initial frame: the recipient's code for a
/// call, the transaction payload as init code for a creation.
pub fn set_bytecode_and_callee(vm: &mut VM<'_>) -> Result<(), VMError> {
    match vm.tx.to {
        TxKind::Call(callee) => {
            let bytecode = vm.db.get_account(callee)?.code.clone();
            vm.current_call_frame.to = callee;
            vm.current_call_frame.code_address = callee;
            vm.current_call_frame.set_code(bytecode);
        }
        TxKind::Create => {
            let created = calculate_create_address(vm.env.origin, vm.tx.nonce);
            vm.current_call_frame.to = created;
            vm.current_call_frame.code_address = created;
            vm.current_call_frame.is_create = true;
            vm.current_call_frame.set_code(vm.tx.data.clone());
            vm.current_call_frame.calldata = Bytes::new();
        }
    }

    // Origin, callee and coinbase start the transaction warm.
    vm.substate.add_accessed_address(vm.env.origin);
    vm.substate.add_accessed_address(vm.current_call_frame.to);
    vm.substate.add_accessed_address(vm.env.coinbase);

    Ok(())
}

/// Moves the transaction value from the sender to the callee.
pub fn transfer_value(vm: &mut VM<'_>) -> Result<(), VMError> {
    let (sender, callee, value) = (
        vm.env.origin,
        vm.current_call_frame.to,
        vm.current_call_frame.msg_value,
    );
    vm.transfer(sender, callee, value)
}

/// Returns the transaction value to the sender after a failed execution.
/// The gas pre-payment and the nonce bump stay.
pub fn undo_value_transfer(vm: &mut VM<'_>) -> Result<(), VMError> {
    let (sender, callee, value) = (
        vm.env.origin,
        vm.current_call_frame.to,
        vm.current_call_frame.msg_value,
    );
    vm.transfer(callee, sender, value)
}

/// Storage refunds are capped at one fifth of the gas used, per
/// https://eips.ethereum.org/EIPS/eip-3529
pub fn compute_gas_refunded(vm: &VM<'_>, gas_used: u64) -> u64 {
    vm.substate.refunded_gas.min(gas_used / 5)
}

/// Returns the unspent part of the pre-payment to the sender.
fn refund_sender(vm: &mut VM<'_>, gas_used: u64) -> Result<(), VMError> {
    let unused_gas = vm
        .tx
        .gas_limit
        .checked_sub(gas_used)
        .ok_or(InternalError::Underflow)?;
    let refund = U256::from(unused_gas)
        .checked_mul(vm.tx.gas_price)
        .ok_or(InternalError::Overflow)?;

    let sender = vm.env.origin;
    vm.increase_account_balance(sender, refund)
}

/// Credits the block producer with the transaction fee.
fn pay_coinbase(vm: &mut VM<'_>, gas_used: u64) -> Result<(), VMError> {
    let fee = U256::from(gas_used)
        .checked_mul(vm.tx.gas_price)
        .ok_or(InternalError::Overflow)?;

    let coinbase = vm.env.coinbase;
    vm.increase_account_balance(coinbase, fee)
}

/// Wipes accounts scheduled for destruction by SELFDESTRUCT.
pub fn delete_self_destruct_accounts(vm: &mut VM<'_>) -> Result<(), VMError> {
    let selfdestruct_set = std::mem::take(&mut vm.substate.selfdestruct_set);
    for address in selfdestruct_set {
        let account = vm.get_account_mut(address)?;
        *account = Default::default();
    }
    Ok(())
}
