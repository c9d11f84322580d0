//! `arbor-hostapi` — contracts between the Arbor VM and native modules.
//!
//! Native modules depend only on this crate. It provides:
//!
//! - `Extension` — one native function callable from the guest
//! - `Module` — a named set of extensions; `NativeModule` is the default one
//! - `ExecutionContext` — the live call an extension runs inside
//! - `ShadowStack` / `ShadowOp` — the host-side stack behind the reserved
//!   `env.__stack*__` imports
//! - `ModuleDeclaration` / `export_module!` — the shared-library artifact
//!   contract
//! - `HostError` — errors raised by host primitives

pub mod error;
pub mod memory;
pub mod traits;
pub mod module;
pub mod shadow_stack;
pub mod declaration;

// Re-export commonly used types at the crate root.
pub use error::HostError;
pub use traits::{ExecutionContext, Extension, Module};
pub use module::NativeModule;
pub use shadow_stack::{ShadowOp, ShadowStack, RESERVED_MODULE, STACKTOP_GLOBAL};
pub use declaration::{ModuleDeclaration, ABI_VERSION, CORE_VERSION, MODULE_SYMBOL};
