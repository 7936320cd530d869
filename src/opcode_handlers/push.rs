//! # Push operations
//!
//! Includes the following opcodes:
//!   - `PUSH0`
//!   - `PUSH1` to `PUSH32`

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcode_handlers::OpcodeHandler,
    vm::VM,
};
use ethereum_types::U256;

/// Implementation for the `PUSHn` opcodes, specialized at compile time for
/// the immediate width `N`.
///
/// Reads `N` bytes of immediate data following the opcode; if the code ends
/// early the missing low bytes read as zero. Advances the PC past the
/// immediate.
pub struct OpPushHandler<const N: usize>;
impl<const N: usize> OpcodeHandler for OpPushHandler<N> {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut vm.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::PUSHN)?;

        // The PC has already been advanced past the opcode byte, so it points
        // at the first immediate byte.
        let pc_offset = current_call_frame.pc;

        let mut buffer = [0u8; 32];
        let available = current_call_frame
            .bytecode
            .get(pc_offset..)
            .unwrap_or_default();
        let take = available.len().min(N);
        buffer[32 - N..32 - N + take].copy_from_slice(&available[..take]);

        current_call_frame
            .stack
            .push1(U256::from_big_endian(&buffer))?;
        current_call_frame.pc = pc_offset.wrapping_add(N);

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `PUSH0` opcode.
pub struct OpPush0Handler;
impl OpcodeHandler for OpPush0Handler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::PUSH0)?;

        vm.current_call_frame.stack.push_zero()?;

        Ok(OpcodeResult::Continue)
    }
}
