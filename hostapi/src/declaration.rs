//! Native module artifact contract.
//!
//! A native module is a `cdylib` that exports a static
//! [`ModuleDeclaration`] under [`MODULE_SYMBOL`]. The loader checks the
//! declaration's versions before calling its constructor. Trait objects
//! cross the library boundary, so the artifact must be built with the same
//! toolchain and the same `arbor-hostapi` version as the host.

use crate::traits::Module;

/// Bumped whenever `Module`, `Extension`, or `ExecutionContext` change
/// shape.
pub const ABI_VERSION: u32 = 1;

/// Version of this crate, compared verbatim by the loader.
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the exported declaration symbol, NUL-terminated.
pub const MODULE_SYMBOL: &[u8] = b"arbor_module_declaration\0";

/// The value every native module artifact exports.
#[derive(Clone, Copy)]
pub struct ModuleDeclaration {
    pub abi_version: u32,
    pub core_version: &'static str,
    pub constructor: fn() -> Box<dyn Module>,
}

impl ModuleDeclaration {
    /// Describe why this declaration cannot be used by this host, if so.
    pub fn incompatibility(&self) -> Option<String> {
        if self.abi_version != ABI_VERSION {
            return Some(format!(
                "ABI version mismatch: expected {}, found {}",
                ABI_VERSION, self.abi_version
            ));
        }
        if self.core_version != CORE_VERSION {
            return Some(format!(
                "arbor-hostapi version mismatch: expected {}, found {}",
                CORE_VERSION, self.core_version
            ));
        }
        None
    }
}

/// Export a module constructor as this library's module declaration.
///
/// ```ignore
/// fn build() -> arbor_hostapi::NativeModule {
///     arbor_hostapi::NativeModule::new("mathx").with("square", square)
/// }
/// arbor_hostapi::export_module!(build);
/// ```
#[macro_export]
macro_rules! export_module {
    ($constructor:path) => {
        #[doc(hidden)]
        #[allow(non_upper_case_globals)]
        #[no_mangle]
        pub static arbor_module_declaration: $crate::ModuleDeclaration = {
            fn __arbor_construct() -> ::std::boxed::Box<dyn $crate::Module> {
                ::std::boxed::Box::new($constructor())
            }
            $crate::ModuleDeclaration {
                abi_version: $crate::ABI_VERSION,
                core_version: $crate::CORE_VERSION,
                constructor: __arbor_construct,
            }
        };
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExecutionContext, NativeModule};

    fn build() -> NativeModule {
        NativeModule::new("mathx").with("one", |_: &mut dyn ExecutionContext| 1)
    }

    crate::export_module!(build);

    #[test]
    fn test_exported_declaration_constructs_module() {
        let decl = arbor_module_declaration;
        assert!(decl.incompatibility().is_none());
        let module = (decl.constructor)();
        assert_eq!(module.name(), "mathx");
        assert!(module.resolve("one").is_some());
    }

    #[test]
    fn test_abi_mismatch() {
        let decl = ModuleDeclaration {
            abi_version: ABI_VERSION + 1,
            ..arbor_module_declaration
        };
        assert!(decl.incompatibility().unwrap().contains("ABI"));
    }

    #[test]
    fn test_core_version_mismatch() {
        let decl = ModuleDeclaration {
            core_version: "0.0.0-other",
            ..arbor_module_declaration
        };
        assert!(decl.incompatibility().unwrap().contains("0.0.0-other"));
    }

    #[test]
    fn test_symbol_is_nul_terminated() {
        assert_eq!(MODULE_SYMBOL.last(), Some(&0));
    }
}
