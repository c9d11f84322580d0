//! Guest import validation.
//!
//! Checks that every import can be expressed by the host before any import
//! is resolved:
//!
//! 1. Function imports use only numeric types and return at most one value
//! 2. Global imports are numeric
//! 3. No table imports

use wasmtime::{ExternType, Module};

use crate::error::VmError;
use crate::host_impl::is_numeric;

/// Validate that the host can satisfy the shape of every guest import.
pub fn validate_module(module: &Module) -> Result<(), VmError> {
    for import in module.imports() {
        let (module_name, field) = (import.module(), import.name());
        match import.ty() {
            ExternType::Func(ft) => {
                if !ft.params().all(|t| is_numeric(&t)) || !ft.results().all(|t| is_numeric(&t)) {
                    return Err(VmError::ValidationError(format!(
                        "import '{}.{}' uses non-numeric types",
                        module_name, field
                    )));
                }
                if ft.results().len() > 1 {
                    return Err(VmError::ValidationError(format!(
                        "import '{}.{}' returns {} values, at most 1 supported",
                        module_name,
                        field,
                        ft.results().len()
                    )));
                }
            }
            ExternType::Global(gt) => {
                if !is_numeric(gt.content()) {
                    return Err(VmError::ValidationError(format!(
                        "global import '{}.{}' is not numeric",
                        module_name, field
                    )));
                }
            }
            ExternType::Memory(_) => {}
            _ => {
                return Err(VmError::ValidationError(format!(
                    "unsupported import kind: {}.{}",
                    module_name, field
                )));
            }
        }
    }

    Ok(())
}
