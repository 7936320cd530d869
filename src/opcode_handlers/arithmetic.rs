//! # Arithmetic operations
//!
//! Includes the following opcodes:
//!   - `ADD`
//!   - `SUB`
//!   - `MUL`
//!   - `DIV`
//!   - `SDIV`
//!   - `MOD`
//!   - `SMOD`
//!   - `ADDMOD`
//!   - `MULMOD`
//!   - `EXP`
//!   - `SIGNEXTEND`

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcode_handlers::OpcodeHandler,
    vm::VM,
};
use ethereum_types::{U256, U512};
use std::cmp::Ordering;

/// Implementation for the `ADD` opcode.
pub struct OpAddHandler;
impl OpcodeHandler for OpAddHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::ADD)?;

        let [lhs, rhs] = *vm.current_call_frame.stack.pop()?;
        let (res, _) = lhs.overflowing_add(rhs);
        vm.current_call_frame.stack.push1(res)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SUB` opcode.
pub struct OpSubHandler;
impl OpcodeHandler for OpSubHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SUB)?;

        let [lhs, rhs] = *vm.current_call_frame.stack.pop()?;
        let (res, _) = lhs.overflowing_sub(rhs);
        vm.current_call_frame.stack.push1(res)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `MUL` opcode.
pub struct OpMulHandler;
impl OpcodeHandler for OpMulHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::MUL)?;

        let [lhs, rhs] = *vm.current_call_frame.stack.pop()?;
        let (res, _) = lhs.overflowing_mul(rhs);
        vm.current_call_frame.stack.push1(res)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `DIV` opcode. Division by zero yields zero.
pub struct OpDivHandler;
impl OpcodeHandler for OpDivHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::DIV)?;

        let [lhs, rhs] = *vm.current_call_frame.stack.pop()?;
        match lhs.checked_div(rhs) {
            Some(res) => vm.current_call_frame.stack.push1(res)?,
            None => vm.current_call_frame.stack.push_zero()?,
        }

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SDIV` opcode.
///
/// Operands are reinterpreted as two's complement. The MIN / -1 case wraps
/// back to MIN because the magnitude negation is modular.
pub struct OpSDivHandler;
impl OpcodeHandler for OpSDivHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SDIV)?;

        let [mut lhs, mut rhs] = *vm.current_call_frame.stack.pop()?;

        let mut sign = false;
        if lhs.bit(255) {
            lhs = U256::zero().overflowing_sub(lhs).0;
            sign = !sign;
        }
        if rhs.bit(255) {
            rhs = U256::zero().overflowing_sub(rhs).0;
            sign = !sign;
        }

        match lhs.checked_div(rhs) {
            Some(mut res) => {
                if sign {
                    res = U256::zero().overflowing_sub(res).0;
                }

                vm.current_call_frame.stack.push1(res)?
            }
            None => vm.current_call_frame.stack.push_zero()?,
        }

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `MOD` opcode. Modulo zero yields zero.
pub struct OpModHandler;
impl OpcodeHandler for OpModHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::MOD)?;

        let [lhs, rhs] = *vm.current_call_frame.stack.pop()?;
        match lhs.checked_rem(rhs) {
            Some(res) => vm.current_call_frame.stack.push1(res)?,
            None => vm.current_call_frame.stack.push_zero()?,
        }

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SMOD` opcode. The result takes the sign of the
/// dividend.
pub struct OpSModHandler;
impl OpcodeHandler for OpSModHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SMOD)?;

        let [mut lhs, mut rhs] = *vm.current_call_frame.stack.pop()?;

        let sign = lhs.bit(255);
        if sign {
            (lhs, _) = (!lhs).overflowing_add(U256::one());
        }
        if rhs.bit(255) {
            (rhs, _) = (!rhs).overflowing_add(U256::one());
        }

        match lhs.checked_rem(rhs) {
            Some(mut res) => {
                if sign && !res.is_zero() {
                    (res, _) = (!res).overflowing_add(U256::one());
                }

                vm.current_call_frame.stack.push1(res)?
            }
            None => vm.current_call_frame.stack.push_zero()?,
        }

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `ADDMOD` opcode, computed in 512 bits so the
/// intermediate sum never wraps.
pub struct OpAddModHandler;
impl OpcodeHandler for OpAddModHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::ADDMOD)?;

        let [lhs, rhs, modulus] = *vm.current_call_frame.stack.pop()?;
        if modulus.is_zero() || modulus == U256::one() {
            vm.current_call_frame.stack.push_zero()?;
        } else {
            let res = (U512::from(lhs) + U512::from(rhs)) % U512::from(modulus);
            vm.current_call_frame
                .stack
                .push1(U256([res.0[0], res.0[1], res.0[2], res.0[3]]))?;
        }

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `MULMOD` opcode, computed on the full 512-bit
/// product.
pub struct OpMulModHandler;
impl OpcodeHandler for OpMulModHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::MULMOD)?;

        let [lhs, rhs, modulus] = *vm.current_call_frame.stack.pop()?;
        if lhs.is_zero() || rhs.is_zero() || modulus.is_zero() {
            vm.current_call_frame.stack.push_zero()?;
        } else {
            let product = lhs.full_mul(rhs);
            let modulus = U512::from(modulus);

            let res = match product.cmp(&modulus) {
                Ordering::Less => product,
                Ordering::Equal => U512::zero(),
                Ordering::Greater => product % modulus,
            };

            vm.current_call_frame
                .stack
                .push1(U256([res.0[0], res.0[1], res.0[2], res.0[3]]))?;
        }

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `EXP` opcode. The dynamic gas grows with the byte
/// width of the exponent.
pub struct OpExpHandler;
impl OpcodeHandler for OpExpHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [base, exponent] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::exp(exponent)?)?;

        let (res, _) = base.overflowing_pow(exponent);
        vm.current_call_frame.stack.push1(res)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SIGNEXTEND` opcode.
pub struct OpSignExtendHandler;
impl OpcodeHandler for OpSignExtendHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::SIGNEXTEND)?;

        let [index, mut value] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame
            .stack
            .push1(match usize::try_from(index) {
                Ok(x) if x < 32 => {
                    if value.bit(8 * x + 7) {
                        value |= U256::MAX << (8 * (x + 1));
                    } else if x != 31 {
                        value &= (U256::one() << (8 * (x + 1))) - 1;
                    }

                    value
                }
                _ => value,
            })?;

        Ok(OpcodeResult::Continue)
    }
}
