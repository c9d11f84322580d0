//! Per-VM mutable state held in the Wasmtime Store, and the execution
//! context handed to extensions.
//!
//! `VmState` owns the shadow stack and the store limits. A `CallFrame`
//! borrows the live `Caller` for exactly one extension call, which is how
//! the context reaches an extension without any "current context" field on
//! the VM.

use arbor_hostapi::{ExecutionContext, HostError, ShadowStack};
use wasmtime::{Caller, Memory, StoreLimits, StoreLimitsBuilder, Val, ValType};

use crate::config::VmConfig;

/// Per-VM mutable state held in the Wasmtime `Store`.
pub struct VmState {
    /// Host-side shadow stack behind the reserved `env` imports.
    pub shadow: ShadowStack,
    /// Memory bound enforced by the store.
    pub limits: StoreLimits,
    /// Extension calls currently on the host stack.
    pub active_calls: usize,
    /// Extension calls made since the VM was instantiated.
    pub extension_calls: u64,
    /// Memory created for an `env.memory` style import, if the guest has one.
    pub imported_memory: Option<Memory>,
}

impl VmState {
    pub fn new(config: &VmConfig) -> Self {
        let limits = StoreLimitsBuilder::new()
            .memory_size(config.max_memory_bytes())
            .build();
        Self {
            shadow: ShadowStack::new(config.initial_stack_top),
            limits,
            active_calls: 0,
            extension_calls: 0,
            imported_memory: None,
        }
    }
}

/// The execution context for one extension call.
pub struct CallFrame<'a, 'c> {
    caller: &'a mut Caller<'c, VmState>,
    memory: Option<Memory>,
    locals: Vec<i64>,
}

impl<'a, 'c> CallFrame<'a, 'c> {
    pub fn new(caller: &'a mut Caller<'c, VmState>, params: &[Val]) -> Self {
        let memory = caller
            .get_export("memory")
            .and_then(|e| e.into_memory())
            .or(caller.data().imported_memory);
        Self {
            caller,
            memory,
            locals: params.iter().map(val_to_i64).collect(),
        }
    }
}

impl ExecutionContext for CallFrame<'_, '_> {
    fn locals(&self) -> &[i64] {
        &self.locals
    }

    fn memory(&self) -> &[u8] {
        match self.memory {
            Some(mem) => mem.data(&*self.caller),
            None => &[],
        }
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        match self.memory {
            Some(mem) => mem.data_mut(&mut *self.caller),
            None => &mut [],
        }
    }

    fn stack_top(&self) -> i64 {
        self.caller.data().shadow.top()
    }

    fn call_depth(&self) -> usize {
        self.caller.data().active_calls
    }

    fn call_export(&mut self, name: &str, args: &[i64]) -> Result<i64, HostError> {
        let func = self
            .caller
            .get_export(name)
            .and_then(|e| e.into_func())
            .ok_or_else(|| HostError::UnknownExport(name.to_string()))?;

        let ty = func.ty(&*self.caller);
        if ty.params().len() != args.len() || ty.results().len() > 1 {
            return Err(HostError::Signature(name.to_string()));
        }
        let params = ty
            .params()
            .zip(args)
            .map(|(t, &a)| i64_to_val(&t, a))
            .collect::<Option<Vec<Val>>>()
            .ok_or_else(|| HostError::Signature(name.to_string()))?;

        let mut results = vec![Val::I64(0); ty.results().len()];
        func.call(&mut *self.caller, &params, &mut results)
            .map_err(|e| HostError::Guest(e.to_string()))?;
        Ok(results.first().map(val_to_i64).unwrap_or(0))
    }
}

/// Widen a WASM value to the `i64` an extension sees.
///
/// i32 is sign-extended; floats are passed as raw bits.
pub fn val_to_i64(val: &Val) -> i64 {
    match val {
        Val::I32(v) => i64::from(*v),
        Val::I64(v) => *v,
        Val::F32(bits) => i64::from(*bits),
        Val::F64(bits) => *bits as i64,
        _ => 0,
    }
}

/// Narrow an `i64` back to a value of type `ty`.
///
/// Returns `None` for vector and reference types.
pub fn i64_to_val(ty: &ValType, value: i64) -> Option<Val> {
    match ty {
        ValType::I32 => Some(Val::I32(value as i32)),
        ValType::I64 => Some(Val::I64(value)),
        ValType::F32 => Some(Val::F32(value as u32)),
        ValType::F64 => Some(Val::F64(value as u64)),
        _ => None,
    }
}

/// True for the value types extensions can exchange.
pub fn is_numeric(ty: &ValType) -> bool {
    matches!(ty, ValType::I32 | ValType::I64 | ValType::F32 | ValType::F64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_starts_at_configured_top() {
        let config = VmConfig {
            initial_stack_top: 1024,
            ..VmConfig::default()
        };
        let state = VmState::new(&config);
        assert_eq!(state.shadow.top(), 1024);
        assert_eq!(state.shadow.depth(), 0);
        assert_eq!(state.active_calls, 0);
        assert!(state.imported_memory.is_none());
    }

    #[test]
    fn test_i32_sign_extends() {
        assert_eq!(val_to_i64(&Val::I32(-1)), -1);
        assert_eq!(val_to_i64(&Val::I64(i64::MIN)), i64::MIN);
    }

    #[test]
    fn test_float_bits_pass_through() {
        let bits = 1.5f64.to_bits();
        let widened = val_to_i64(&Val::F64(bits));
        match i64_to_val(&ValType::F64, widened).unwrap() {
            Val::F64(back) => assert_eq!(f64::from_bits(back), 1.5),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_narrow_to_i32_truncates() {
        match i64_to_val(&ValType::I32, 0x1_0000_0007).unwrap() {
            Val::I32(v) => assert_eq!(v, 7),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_numeric_types() {
        assert!(is_numeric(&ValType::I32));
        assert!(is_numeric(&ValType::F64));
        assert!(!is_numeric(&ValType::V128));
    }
}
