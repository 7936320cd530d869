use crate::{
    errors::{ContextResult, InternalError, TxResult},
    opcodes::Opcode,
    vm::Log,
};
use bytes::Bytes;
use ethereum_types::{Address, U256};
use serde::Serialize;

fn u64_to_hex<S>(x: &u64, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(&format!("0x{x:x}"))
}

fn u256_to_hex<S>(x: &U256, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(&format!("0x{x:x}"))
}

fn bytes_to_hex<S>(x: &Bytes, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(&format!("0x{}", hex_encode(x)))
}

fn hex_encode(data: &[u8]) -> String {
    data.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn option_string_empty_as_str<S>(x: &Option<String>, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(x.as_deref().unwrap_or(""))
}

/// One call frame of the trace tree.
#[derive(Debug, Clone, Serialize)]
pub struct TracerCallFrame {
    #[serde(rename = "type")]
    pub call_type: Opcode,
    pub from: Address,
    pub to: Address,
    #[serde(serialize_with = "u256_to_hex")]
    pub value: U256,
    #[serde(serialize_with = "u64_to_hex")]
    pub gas: u64,
    #[serde(rename = "gasUsed", serialize_with = "u64_to_hex")]
    pub gas_used: u64,
    #[serde(serialize_with = "bytes_to_hex")]
    pub input: Bytes,
    #[serde(serialize_with = "bytes_to_hex")]
    pub output: Bytes,
    #[serde(serialize_with = "option_string_empty_as_str")]
    pub error: Option<String>,
    #[serde(rename = "revertReason", serialize_with = "option_string_empty_as_str")]
    pub revert_reason: Option<String>,
    pub logs: Vec<Log>,
    pub calls: Vec<TracerCallFrame>,
}

impl TracerCallFrame {
    pub fn new(
        call_type: Opcode,
        from: Address,
        to: Address,
        value: U256,
        gas: u64,
        input: Bytes,
    ) -> Self {
        Self {
            call_type,
            from,
            to,
            value,
            gas,
            gas_used: 0,
            input,
            output: Bytes::new(),
            error: None,
            revert_reason: None,
            logs: Vec::new(),
            calls: Vec::new(),
        }
    }

    fn process_output(
        &mut self,
        gas_used: u64,
        output: Bytes,
        error: Option<String>,
        revert_reason: Option<String>,
    ) {
        self.gas_used = gas_used;
        self.output = output;
        self.error = error;
        self.revert_reason = revert_reason;
    }
}

/// Observation hook shaped after geth's callTracer
/// (https://geth.ethereum.org/docs/developers/evm-tracing/built-in-tracers).
///
/// Use [`CallTracer::disabled`] when tracing is not wanted; every entry
/// point is then a no-op.
#[derive(Debug, Default)]
pub struct CallTracer {
    /// Stack of open call frames; when execution ends exactly one remains.
    pub callframes: Vec<TracerCallFrame>,
    /// Trace only the external transaction, not the nested calls.
    pub only_top_call: bool,
    /// Attach emitted logs to their frames.
    pub with_log: bool,
    pub active: bool,
}

impl CallTracer {
    pub fn new(only_top_call: bool, with_log: bool) -> Self {
        CallTracer {
            callframes: vec![],
            only_top_call,
            with_log,
            active: true,
        }
    }

    pub fn disabled() -> Self {
        CallTracer {
            active: false,
            ..Default::default()
        }
    }

    /// Opens a frame for a call about to start.
    pub fn enter(
        &mut self,
        call_type: Opcode,
        from: Address,
        to: Address,
        value: U256,
        gas: u64,
        input: Bytes,
    ) {
        if !self.active {
            return;
        }
        if self.only_top_call && !self.callframes.is_empty() {
            return;
        }
        self.callframes
            .push(TracerCallFrame::new(call_type, from, to, value, gas, input));
    }

    fn exit(
        &mut self,
        gas_used: u64,
        output: Bytes,
        error: Option<String>,
        revert_reason: Option<String>,
    ) -> Result<(), InternalError> {
        let mut executed_callframe = self
            .callframes
            .pop()
            .ok_or(InternalError::CouldNotPopCallframe)?;

        executed_callframe.process_output(gas_used, output, error, revert_reason);

        // Executed frames nest under their caller; the last one stays as the
        // root of the trace.
        if let Some(parent_callframe) = self.callframes.last_mut() {
            parent_callframe.calls.push(executed_callframe);
        } else {
            self.callframes.push(executed_callframe);
        }
        Ok(())
    }

    /// Closes the innermost frame with a finished context's outcome.
    pub fn exit_context(
        &mut self,
        ctx_result: &ContextResult,
        is_top_call: bool,
    ) -> Result<(), InternalError> {
        if !self.active {
            return Ok(());
        }
        if self.only_top_call && !is_top_call {
            return Ok(());
        }

        let (error, revert_reason) = if let TxResult::Revert(ref err) = ctx_result.result {
            let reason = String::from_utf8(ctx_result.output.to_vec()).ok();
            (Some(err.to_string()), reason)
        } else {
            (None, None)
        };

        self.exit(
            ctx_result.gas_used,
            ctx_result.output.clone(),
            error,
            revert_reason,
        )
    }

    /// Closes a frame for a call that failed before executing any code.
    pub fn exit_early(&mut self, gas_used: u64, error: Option<String>) -> Result<(), InternalError> {
        if !self.active || self.only_top_call {
            return Ok(());
        }
        self.exit(gas_used, Bytes::new(), error, None)
    }

    /// Attaches a log to the innermost frame.
    pub fn log(&mut self, log: &Log) {
        if !self.active || !self.with_log {
            return;
        }
        if let Some(callframe) = self.callframes.last_mut() {
            callframe.logs.push(log.clone());
        }
    }
}
