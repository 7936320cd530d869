//! # Hashing operations
//!
//! Includes the following opcodes:
//!   - `KECCAK256`

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    memory::calculate_memory_size,
    opcode_handlers::OpcodeHandler,
    utils::{h256_to_u256, keccak, size_offset_to_usize},
    vm::VM,
};

/// Implementation for the `KECCAK256` opcode.
///
/// Hashes a memory slice, expanding memory to cover it first; the gas charge
/// combines the per-word hashing cost with the expansion cost.
pub struct OpKeccak256Handler;
impl OpcodeHandler for OpKeccak256Handler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [offset, len] = *vm.current_call_frame.stack.pop()?;
        let (len, offset) = size_offset_to_usize(len, offset)?;

        let current_call_frame = &mut vm.current_call_frame;
        current_call_frame.increase_consumed_gas(gas_cost::keccak256(
            calculate_memory_size(offset, len)?,
            current_call_frame.memory.len(),
            len,
        )?)?;

        let data = current_call_frame.memory.load_range(offset, len)?;
        current_call_frame.stack.push1(h256_to_u256(keccak(data)))?;

        Ok(OpcodeResult::Continue)
    }
}
