use crate::{
    errors::{ExecutionReport, VMError},
    vm::VM,
};

/// Pre- and post-execution logic around the interpreter loop.
///
/// The default hook implements mainnet transaction semantics; hosts can
/// stack additional hooks for custom fee models or validation rules.
pub trait Hook {
    /// Runs before the first opcode: transaction validation, intrinsic gas,
    /// pre-payment, nonce bump, callee resolution and value transfer.
    fn prepare_execution(&self, vm: &mut VM<'_>) -> Result<(), VMError>;

    /// Runs after the frame stack has unwound: refunds, fee payment and
    /// cleanup of destroyed accounts.
    fn finalize_execution(
        &self,
        vm: &mut VM<'_>,
        report: &mut ExecutionReport,
    ) -> Result<(), VMError>;
}
