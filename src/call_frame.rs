use crate::{
    account::Account,
    errors::ExceptionalHalt,
    memory::Memory,
    opcodes::Opcode,
    stack::Stack,
};
use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use rustc_hash::FxHashMap;

/// Positions in the bytecode that may not be jumped to even though they hold
/// a `0x5b` byte, because they are immediate data of a preceding PUSH.
///
/// Computed once per frame with a single scan of the code.
#[derive(Debug, Clone, Default)]
pub struct JumpTargetFilter {
    blacklist: Vec<u64>,
}

impl JumpTargetFilter {
    pub fn new(bytecode: &[u8]) -> Self {
        let mut blacklist = vec![0u64; bytecode.len().div_ceil(64)];

        let mut pc = 0;
        while let Some(&opcode) = bytecode.get(pc) {
            if (Opcode::PUSH1 as u8..=Opcode::PUSH32 as u8).contains(&opcode) {
                let n = usize::from(opcode - Opcode::PUSH1 as u8) + 1;
                for i in pc + 1..=pc + n {
                    if let Some(word) = blacklist.get_mut(i / 64) {
                        *word |= 1 << (i % 64);
                    }
                }
                pc += n;
            }
            pc += 1;
        }

        Self { blacklist }
    }

    pub fn is_blacklisted(&self, target: usize) -> bool {
        self.blacklist
            .get(target / 64)
            .is_some_and(|word| word & (1 << (target % 64)) != 0)
    }
}

/// Undo log of one call frame. Records the pre-frame value of every account
/// and storage slot the frame touched, so a revert can restore them and a
/// successful return can hand them to the parent's log.
#[derive(Debug, Clone, Default)]
pub struct CallFrameBackup {
    pub original_accounts_info: FxHashMap<Address, Account>,
    pub original_account_storage_slots: FxHashMap<Address, FxHashMap<H256, U256>>,
}

impl CallFrameBackup {
    pub fn clear(&mut self) {
        self.original_accounts_info.clear();
        self.original_account_storage_slots.clear();
    }
}

/// Execution context of a single message call or create.
///
/// Owns its stack and memory; both are released (or returned to the pool)
/// when the frame finishes, on every exit path.
#[derive(Debug, Clone, Default)]
pub struct CallFrame {
    /// Address whose context is executing (storage, logs, SELFBALANCE).
    pub to: Address,
    /// Account that invoked this frame.
    pub msg_sender: Address,
    /// Address the running code was loaded from. Differs from `to` for
    /// DELEGATECALL and CALLCODE.
    pub code_address: Address,
    pub bytecode: Bytes,
    pub calldata: Bytes,
    /// Value in wei passed with the call.
    pub msg_value: U256,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub pc: usize,
    pub stack: Stack,
    pub memory: Memory,
    /// Data this frame returned with RETURN/REVERT.
    pub output: Bytes,
    /// Output of the most recent child call (RETURNDATA* opcodes).
    pub sub_return_data: Bytes,
    pub is_static: bool,
    pub is_create: bool,
    pub depth: usize,
    /// Region of the parent's memory where the child output is copied back.
    pub ret_offset: usize,
    pub ret_size: usize,
    pub call_frame_backup: CallFrameBackup,
    pub jump_target_filter: JumpTargetFilter,
}

impl CallFrame {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        msg_sender: Address,
        to: Address,
        code_address: Address,
        bytecode: Bytes,
        msg_value: U256,
        calldata: Bytes,
        is_static: bool,
        gas_limit: u64,
        depth: usize,
        is_create: bool,
        ret_offset: usize,
        ret_size: usize,
        stack: Stack,
    ) -> Self {
        let jump_target_filter = JumpTargetFilter::new(&bytecode);
        Self {
            msg_sender,
            to,
            code_address,
            bytecode,
            calldata,
            msg_value,
            gas_limit,
            gas_used: 0,
            pc: 0,
            stack,
            memory: Memory::new(),
            output: Bytes::new(),
            sub_return_data: Bytes::new(),
            is_static,
            is_create,
            depth,
            ret_offset,
            ret_size,
            call_frame_backup: CallFrameBackup::default(),
            jump_target_filter,
        }
    }

    /// Charges `cost` gas against this frame's budget.
    #[inline(always)]
    pub fn increase_consumed_gas(&mut self, cost: u64) -> Result<(), ExceptionalHalt> {
        let new_gas_used = self
            .gas_used
            .checked_add(cost)
            .ok_or(ExceptionalHalt::OutOfGas)?;
        if new_gas_used > self.gas_limit {
            return Err(ExceptionalHalt::OutOfGas);
        }
        self.gas_used = new_gas_used;

        Ok(())
    }

    pub fn gas_remaining(&self) -> u64 {
        self.gas_limit.saturating_sub(self.gas_used)
    }

    /// Fetches the byte at the program counter and advances it. Fetching past
    /// the end of the code is an implicit STOP.
    #[inline(always)]
    pub fn next_opcode(&mut self) -> u8 {
        let opcode = self
            .bytecode
            .get(self.pc)
            .copied()
            .unwrap_or(Opcode::STOP as u8);
        self.pc = self.pc.wrapping_add(1);
        opcode
    }

    /// Replaces the frame's code, recomputing the jump target filter.
    pub fn set_code(&mut self, code: Bytes) {
        self.jump_target_filter = JumpTargetFilter::new(&code);
        self.bytecode = code;
    }

    /// A jump target is valid when it points at a JUMPDEST byte that is not
    /// immediate data of a PUSH.
    pub fn valid_jump(&self, target: usize) -> bool {
        self.bytecode
            .get(target)
            .is_some_and(|&byte| byte == Opcode::JUMPDEST as u8)
            && !self.jump_target_filter.is_blacklisted(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jumpdest_inside_push_immediate_is_filtered() {
        // PUSH2 0x5b5b JUMPDEST STOP
        let code = Bytes::from_static(&[0x61, 0x5b, 0x5b, 0x5b, 0x00]);
        let filter = JumpTargetFilter::new(&code);
        assert!(filter.is_blacklisted(1));
        assert!(filter.is_blacklisted(2));
        assert!(!filter.is_blacklisted(3));
    }

    #[test]
    fn valid_jump_requires_a_jumpdest_byte() {
        let frame = CallFrame {
            bytecode: Bytes::from_static(&[0x60, 0x5b, 0x5b, 0x00]),
            jump_target_filter: JumpTargetFilter::new(&[0x60, 0x5b, 0x5b, 0x00]),
            ..Default::default()
        };
        assert!(!frame.valid_jump(0));
        assert!(!frame.valid_jump(1)); // 0x5b, but PUSH1 immediate
        assert!(frame.valid_jump(2));
        assert!(!frame.valid_jump(3));
        assert!(!frame.valid_jump(400));
    }

    #[test]
    fn out_of_gas_leaves_counter_untouched() {
        let mut frame = CallFrame {
            gas_limit: 10,
            ..Default::default()
        };
        frame.increase_consumed_gas(7).unwrap();
        assert_eq!(
            frame.increase_consumed_gas(4),
            Err(ExceptionalHalt::OutOfGas)
        );
        assert_eq!(frame.gas_used, 7);
        assert_eq!(frame.gas_remaining(), 3);
    }
}
