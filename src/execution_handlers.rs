use crate::{
    constants::{EOF_PREFIX, MAX_CODE_SIZE},
    errors::{ContextResult, ExceptionalHalt, TxResult, VMError},
    gas_cost::CODE_DEPOSIT_COST,
    vm::VM,
};
use bytes::Bytes;

impl<'a> VM<'a> {
    /// Translates a frame that halted normally (STOP, RETURN, or running off
    /// the end of the code) into a [`ContextResult`].
    ///
    /// For create frames the returned code is validated and deposited here:
    /// an oversized or `0xef`-prefixed result, or one whose deposit cost
    /// cannot be paid, turns the whole frame into a revert that consumes all
    /// gas.
    pub fn handle_opcode_result(&mut self) -> Result<ContextResult, VMError> {
        if self.current_call_frame.is_create {
            let contract_code = std::mem::take(&mut self.current_call_frame.output);

            let code_deposit_cost = u64::try_from(contract_code.len())
                .ok()
                .and_then(|len| len.checked_mul(CODE_DEPOSIT_COST))
                .ok_or(ExceptionalHalt::OutOfGas)?;

            let validate_create = if contract_code.len() > MAX_CODE_SIZE {
                Err(ExceptionalHalt::ContractOutputTooBig)
            } else if contract_code.first() == Some(&EOF_PREFIX) {
                Err(ExceptionalHalt::InvalidContractPrefix)
            } else if self
                .current_call_frame
                .increase_consumed_gas(code_deposit_cost)
                .is_err()
            {
                Err(ExceptionalHalt::OutOfGas)
            } else {
                Ok(self.current_call_frame.to)
            };

            match validate_create {
                Ok(new_address) => {
                    self.update_account_bytecode(new_address, contract_code)?;
                }
                Err(error) => {
                    self.current_call_frame.gas_used = self.current_call_frame.gas_limit;

                    return Ok(ContextResult {
                        result: TxResult::Revert(error.into()),
                        gas_used: self.current_call_frame.gas_used,
                        output: Bytes::new(),
                    });
                }
            }
        }

        Ok(ContextResult {
            result: TxResult::Success,
            gas_used: self.current_call_frame.gas_used,
            output: std::mem::take(&mut self.current_call_frame.output),
        })
    }

    /// Translates an error raised by a handler into a [`ContextResult`].
    ///
    /// Internal and database errors propagate to the host. Everything except
    /// an explicit REVERT consumes all remaining gas and discards the output.
    pub fn handle_opcode_error(&mut self, error: VMError) -> Result<ContextResult, VMError> {
        if error.should_propagate() {
            return Err(error);
        }

        if !error.is_revert_opcode() {
            self.current_call_frame.gas_used = self.current_call_frame.gas_limit;
        }

        Ok(ContextResult {
            result: TxResult::Revert(error),
            gas_used: self.current_call_frame.gas_used,
            // Bytes::new() unless the error is RevertOpcode.
            output: std::mem::take(&mut self.current_call_frame.output),
        })
    }
}
