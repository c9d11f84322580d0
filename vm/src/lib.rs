//! `arbor-vm` — host-side bridge between a wasmtime guest and native code.
//!
//! This crate resolves a guest's imports against a registry of native
//! modules and runs the guest. It provides:
//!
//! - **Module registry:** name → `Module`, populated statically or from
//!   shared-library artifacts
//! - **Native module loading:** `libloading`-based, with ABI checks
//! - **Import resolution:** reserved `env` shadow-stack primitives first,
//!   then the registry; unresolvable imports are fatal
//! - **Diagnostics:** shadow-stack, memory, and backtrace dump on failure
//! - **Source loading:** bytecode from disk with an mtime-keyed cache
//!
//! The primary entry point is [`Vm::run`].

pub mod error;
pub mod config;
pub mod host_impl;
pub mod registry;
pub mod loader;
pub mod resolver;
pub mod validation;
pub mod linker;
pub mod diagnostics;
pub mod runtime;
pub mod source;

pub use error::{LoadError, ResolutionError, SourceError, VmError};
pub use config::VmConfig;
pub use diagnostics::Diagnostics;
pub use registry::ModuleRegistry;
pub use resolver::{Binding, HostResolver, ImportResolver};
pub use runtime::{run_wasm, Vm};
pub use source::{LoadedSource, SourceLoader};
