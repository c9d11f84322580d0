//! Import binding.
//!
//! Walks the guest's imports in declaration order and builds one `Extern`
//! per import, ready for `Instance::new`:
//!
//! - shadow-stack primitives become host functions over `VmState::shadow`
//! - extensions become host functions that build a `CallFrame` for the
//!   duration of the call
//! - `env.STACKTOP_ASM` becomes a global initialized to the current top
//! - memory imports get a fresh memory of the declared type, recorded in
//!   `VmState::imported_memory`
//!
//! Each `(module, field)` is resolved once, even when the guest imports it
//! several times under different signatures. Any resolution failure stops
//! linking; the guest is never instantiated.

use std::collections::HashMap;
use std::sync::Arc;

use arbor_hostapi::{Extension, ShadowOp};
use tracing::trace;
use wasmtime::{Caller, Extern, ExternType, Func, FuncType, Global, Memory, Module, Store, Val};

use crate::error::VmError;
use crate::host_impl::{i64_to_val, val_to_i64, CallFrame, VmState};
use crate::resolver::{Binding, ImportResolver};

/// Resolve every import of `module` and return the externs in import order.
pub fn link_imports(
    store: &mut Store<VmState>,
    module: &Module,
    resolver: &dyn ImportResolver,
) -> Result<Vec<Extern>, VmError> {
    let mut bindings: HashMap<(String, String), Binding> = HashMap::new();
    let mut externs = Vec::new();

    for import in module.imports() {
        let (module_name, field) = (import.module(), import.name());
        let item: Extern = match import.ty() {
            ExternType::Func(ft) => {
                let key = (module_name.to_string(), field.to_string());
                let binding = match bindings.get(&key) {
                    Some(binding) => binding.clone(),
                    None => {
                        let binding = resolver.resolve_function(module_name, field)?;
                        bindings.insert(key, binding.clone());
                        binding
                    }
                };
                define_function(store, module_name, field, ft, binding).into()
            }
            ExternType::Global(gt) => {
                let value = resolver.resolve_global(module_name, field)?;
                let init = i64_to_val(gt.content(), value).ok_or_else(|| {
                    VmError::ValidationError(format!(
                        "global import '{}.{}' is not numeric",
                        module_name, field
                    ))
                })?;
                Global::new(&mut *store, gt, init)?.into()
            }
            ExternType::Memory(mt) => {
                let memory = Memory::new(&mut *store, mt)?;
                store.data_mut().imported_memory = Some(memory);
                memory.into()
            }
            _ => {
                return Err(VmError::ValidationError(format!(
                    "unsupported import kind: {}.{}",
                    module_name, field
                )));
            }
        };
        externs.push(item);
    }
    Ok(externs)
}

fn define_function(
    store: &mut Store<VmState>,
    module_name: &str,
    field: &str,
    ty: FuncType,
    binding: Binding,
) -> Func {
    let result_ty = ty.results().next();
    match binding {
        Binding::Primitive(op) => Func::new(&mut *store, ty, move |mut caller, params, results| {
            let value = call_primitive(&mut caller, op, params)?;
            write_result(results, result_ty.as_ref(), value);
            Ok(())
        }),
        Binding::Extension(extension) => {
            let name = format!("{}.{}", module_name, field);
            Func::new(&mut *store, ty, move |mut caller, params, results| {
                let value = call_extension(&mut caller, &extension, &name, params);
                write_result(results, result_ty.as_ref(), value);
                Ok(())
            })
        }
    }
}

/// Run a shadow-stack primitive. Underflow traps the guest.
fn call_primitive(
    caller: &mut Caller<'_, VmState>,
    op: ShadowOp,
    params: &[Val],
) -> anyhow::Result<i64> {
    let locals: Vec<i64> = params.iter().map(val_to_i64).collect();
    let value = op.apply(&mut caller.data_mut().shadow, &locals)?;
    trace!(?op, value, "shadow-stack primitive");
    Ok(value)
}

/// Run an extension with a context that lives exactly as long as the call.
fn call_extension(
    caller: &mut Caller<'_, VmState>,
    extension: &Arc<dyn Extension>,
    name: &str,
    params: &[Val],
) -> i64 {
    {
        let state = caller.data_mut();
        state.active_calls += 1;
        state.extension_calls += 1;
    }
    let value = {
        let mut frame = CallFrame::new(caller, params);
        extension.run(&mut frame)
    };
    caller.data_mut().active_calls -= 1;
    trace!(extension = name, value, "extension returned");
    value
}

fn write_result(results: &mut [Val], ty: Option<&wasmtime::ValType>, value: i64) {
    if let (Some(slot), Some(ty)) = (results.first_mut(), ty) {
        if let Some(val) = i64_to_val(ty, value) {
            *slot = val;
        }
    }
}
