//! Extension, module, and execution-context contracts.
//!
//! An `Extension` is one native function the guest can import. A `Module`
//! is a named collection of extensions. The VM only ever sees modules
//! through the `Module` trait, whether they were registered statically or
//! loaded from a shared library.

use std::sync::Arc;

use crate::error::HostError;
use crate::memory;

/// The live call an extension is running inside.
///
/// A context is valid only for the duration of the `Extension::run` call it
/// was passed to; the borrow makes retaining it afterwards impossible.
pub trait ExecutionContext {
    /// The calling frame's locals (the import's parameters), widened to
    /// `i64`. Floats are passed as raw bits.
    fn locals(&self) -> &[i64];

    /// Guest linear memory (exported `memory` or an imported one), or an
    /// empty slice if the guest has none.
    fn memory(&self) -> &[u8];

    /// Mutable guest linear memory.
    fn memory_mut(&mut self) -> &mut [u8];

    /// Current shadow-stack top.
    fn stack_top(&self) -> i64;

    /// Number of extension calls currently on the host stack, this one
    /// included.
    fn call_depth(&self) -> usize;

    /// Call back into a guest export through the same VM.
    fn call_export(&mut self, name: &str, args: &[i64]) -> Result<i64, HostError>;

    /// The local at `index`, if the import declares that many parameters.
    fn local(&self, index: usize) -> Option<i64> {
        self.locals().get(index).copied()
    }

    /// Read `len` bytes of guest memory at `ptr`.
    fn read_memory(&self, ptr: i64, len: i64) -> Result<Vec<u8>, HostError> {
        memory::read_bytes(self.memory(), ptr, len)
    }

    /// Write `data` into guest memory at `ptr`.
    fn write_memory(&mut self, ptr: i64, data: &[u8]) -> Result<(), HostError> {
        memory::write_bytes(self.memory_mut(), ptr, data)
    }
}

/// A natively implemented function callable from the guest.
///
/// Extensions may close over host state but must not hold on to the
/// context they are given.
pub trait Extension: Send + Sync {
    /// Run the extension against the live call and return its result.
    fn run(&self, ctx: &mut dyn ExecutionContext) -> i64;
}

impl<F> Extension for F
where
    F: Fn(&mut dyn ExecutionContext) -> i64 + Send + Sync,
{
    fn run(&self, ctx: &mut dyn ExecutionContext) -> i64 {
        self(ctx)
    }
}

/// A named set of extensions, looked up by field name.
pub trait Module: Send + Sync {
    /// The name guests import this module under.
    fn name(&self) -> &str;

    /// Find the extension registered for `field`. Must not mutate.
    fn resolve(&self, field: &str) -> Option<Arc<dyn Extension>>;

    /// Field names this module provides, for diagnostics.
    fn fields(&self) -> Vec<String> {
        Vec::new()
    }

    /// Mutable access when this is the default `NativeModule`.
    fn as_native_mut(&mut self) -> Option<&mut crate::NativeModule> {
        None
    }
}
