//! # Comparison and bitwise logic operations
//!
//! Includes the following opcodes:
//!   - `LT`
//!   - `GT`
//!   - `SLT`
//!   - `SGT`
//!   - `EQ`
//!   - `ISZERO`
//!   - `AND`
//!   - `OR`
//!   - `XOR`
//!   - `NOT`
//!   - `BYTE`
//!   - `SHL`
//!   - `SHR`
//!   - `SAR`

use crate::{
    constants::WORD_SIZE,
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcode_handlers::OpcodeHandler,
    vm::VM,
};
use ethereum_types::U256;

/// Implementation for the `LT` opcode.
pub struct OpLtHandler;
impl OpcodeHandler for OpLtHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::LT)?;

        let [lho, rho] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push1(u256_from_bool(lho < rho))?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `GT` opcode.
pub struct OpGtHandler;
impl OpcodeHandler for OpGtHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::GT)?;

        let [lho, rho] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push1(u256_from_bool(lho > rho))?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SLT` opcode (signed less than).
pub struct OpSLtHandler;
impl OpcodeHandler for OpSLtHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SLT)?;

        let [lho, rho] = *vm.current_call_frame.stack.pop()?;
        let lho_is_negative = lho.bit(255);
        let rho_is_negative = rho.bit(255);
        let result = if lho_is_negative == rho_is_negative {
            // Compare magnitudes if signs are the same
            u256_from_bool(lho < rho)
        } else {
            // Negative is smaller if signs differ
            u256_from_bool(lho_is_negative)
        };
        vm.current_call_frame.stack.push1(result)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SGT` opcode (signed greater than).
pub struct OpSGtHandler;
impl OpcodeHandler for OpSGtHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SGT)?;

        let [lho, rho] = *vm.current_call_frame.stack.pop()?;
        let lho_is_negative = lho.bit(255);
        let rho_is_negative = rho.bit(255);
        let result = if lho_is_negative == rho_is_negative {
            // Compare magnitudes if signs are the same
            u256_from_bool(lho > rho)
        } else {
            // Positive is bigger if signs differ
            u256_from_bool(rho_is_negative)
        };
        vm.current_call_frame.stack.push1(result)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `EQ` opcode.
pub struct OpEqHandler;
impl OpcodeHandler for OpEqHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::EQ)?;

        let [lho, rho] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame
            .stack
            .push1(u256_from_bool(lho == rho))?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `ISZERO` opcode.
pub struct OpIsZeroHandler;
impl OpcodeHandler for OpIsZeroHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::ISZERO)?;

        let operand = vm.current_call_frame.stack.pop1()?;
        vm.current_call_frame
            .stack
            .push1(u256_from_bool(operand.is_zero()))?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `AND` opcode.
pub struct OpAndHandler;
impl OpcodeHandler for OpAndHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::AND)?;

        let [a, b] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push1(a & b)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `OR` opcode.
pub struct OpOrHandler;
impl OpcodeHandler for OpOrHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::OR)?;

        let [a, b] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push1(a | b)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `XOR` opcode.
pub struct OpXorHandler;
impl OpcodeHandler for OpXorHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::XOR)?;

        let [a, b] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push1(a ^ b)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `NOT` opcode.
pub struct OpNotHandler;
impl OpcodeHandler for OpNotHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::NOT)?;

        let a = vm.current_call_frame.stack.pop1()?;
        vm.current_call_frame.stack.push1(!a)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `BYTE` opcode. Selects the i-th most significant
/// byte; indices past the word push zero.
pub struct OpByteHandler;
impl OpcodeHandler for OpByteHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::BYTE)?;

        let [index, value] = *vm.current_call_frame.stack.pop()?;
        let byte_index: usize = match index.try_into() {
            Ok(byte_index) => byte_index,
            Err(_) => {
                vm.current_call_frame.stack.push_zero()?;
                return Ok(OpcodeResult::Continue);
            }
        };

        if byte_index < WORD_SIZE {
            // U256::byte counts from the least significant end.
            let byte_to_push = WORD_SIZE - byte_index - 1;
            vm.current_call_frame
                .stack
                .push1(U256::from(value.byte(byte_to_push)))?;
        } else {
            vm.current_call_frame.stack.push_zero()?;
        }

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SHL` opcode. Shifts of 256 or more yield zero.
pub struct OpShlHandler;
impl OpcodeHandler for OpShlHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SHL)?;

        let [shift, value] = *vm.current_call_frame.stack.pop()?;
        match shift_amount(shift) {
            Some(shift) => vm.current_call_frame.stack.push1(value << shift)?,
            None => vm.current_call_frame.stack.push_zero()?,
        }

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SHR` opcode. Shifts of 256 or more yield zero.
pub struct OpShrHandler;
impl OpcodeHandler for OpShrHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SHR)?;

        let [shift, value] = *vm.current_call_frame.stack.pop()?;
        match shift_amount(shift) {
            Some(shift) => vm.current_call_frame.stack.push1(value >> shift)?,
            None => vm.current_call_frame.stack.push_zero()?,
        }

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SAR` opcode (arithmetic shift right). The sign bit
/// is preserved; oversized shifts saturate to zero or all ones.
pub struct OpSarHandler;
impl OpcodeHandler for OpSarHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SAR)?;

        let [shift, value] = *vm.current_call_frame.stack.pop()?;
        let is_negative = value.bit(255);

        let res = match shift_amount(shift) {
            Some(0) => value,
            Some(shift) => {
                if is_negative {
                    (value >> shift) | (U256::MAX << (256 - shift))
                } else {
                    value >> shift
                }
            }
            None => {
                if is_negative {
                    U256::MAX
                } else {
                    U256::zero()
                }
            }
        };
        vm.current_call_frame.stack.push1(res)?;

        Ok(OpcodeResult::Continue)
    }
}

fn shift_amount(shift: U256) -> Option<usize> {
    usize::try_from(shift).ok().filter(|&shift| shift < 256)
}

fn u256_from_bool(value: bool) -> U256 {
    if value {
        U256::one()
    } else {
        U256::zero()
    }
}
