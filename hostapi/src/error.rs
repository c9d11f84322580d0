//! Host-side error types for Arbor extensions.
//!
//! `HostError` is returned by the fallible parts of the host surface that
//! extensions and the shadow-stack primitives touch: guest memory access,
//! reentrant export calls, and shadow-stack discipline.

/// Error raised by host primitives and `ExecutionContext` operations.
///
/// When a shadow-stack primitive fails, the VM turns the error into a trap,
/// so the guest never observes it as a return value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// `__stackpop__` / `__popstack__` with no saved frames.
    #[error("shadow stack underflow: pop with no saved frames")]
    StackUnderflow,

    /// Guest memory range `[ptr, ptr+len)` is out of bounds.
    #[error("pointer out of bounds")]
    BadPointer,

    /// Reentrant call to an export the guest does not provide.
    #[error("guest has no exported function '{0}'")]
    UnknownExport(String),

    /// Arguments or results do not fit the export's signature.
    #[error("signature mismatch calling '{0}'")]
    Signature(String),

    /// Reentrant guest call trapped.
    #[error("guest call failed: {0}")]
    Guest(String),
}

impl HostError {
    /// True when the error breaks a host invariant rather than reporting
    /// bad input from an extension.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::StackUnderflow)
    }
}
