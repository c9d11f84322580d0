//! VM error types.

use std::path::PathBuf;

use arbor_hostapi::HostError;

/// Top-level error type for the VM crate.
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// Wasmtime engine, compilation, or instantiation error.
    #[error("wasmtime error: {0}")]
    Wasmtime(#[from] anyhow::Error),

    /// Guest imports something the host cannot express (tables, vector or
    /// reference types, multi-value results).
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A native module artifact could not be loaded.
    #[error("module load error: {0}")]
    Load(#[from] LoadError),

    /// An import could not be resolved; the guest cannot run as given.
    #[error("import resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    /// The configured entrypoint is not exported by the guest.
    #[error("entry function '{0}' not found")]
    EntrypointNotFound(String),

    /// A host primitive trapped (e.g. shadow-stack underflow).
    #[error("host error: {0}")]
    Host(#[from] HostError),

    /// WASM guest trapped.
    #[error("guest trapped: {0}")]
    GuestTrapped(String),

    /// Guest accessed linear memory out of bounds.
    #[error("memory error: {0}")]
    MemoryError(String),

    /// Guest bytecode could not be read.
    #[error("source error: {0}")]
    Source(#[from] SourceError),
}

impl VmError {
    /// True for failures that mean the guest program cannot continue as
    /// given: unresolved imports and broken host invariants.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Resolution(_) => true,
            Self::Host(e) => e.is_invariant_violation(),
            _ => false,
        }
    }
}

/// Failure loading a native module artifact. Each variant is one distinct
/// failure mode; all are recoverable.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// No file at the given path.
    #[error("module artifact not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The file exists but the dynamic loader rejected it.
    #[error("failed to open module artifact {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    /// The library does not export the module declaration symbol.
    #[error("module artifact {} does not export '{symbol}'", path.display())]
    MissingExport { path: PathBuf, symbol: String },

    /// The declaration was built against an incompatible host API.
    #[error("module artifact {} is incompatible: {reason}", path.display())]
    Incompatible { path: PathBuf, reason: String },
}

/// Unresolvable import. The guest cannot be linked, so these abort the
/// execution before any guest code runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// No module registered under the import's module name.
    #[error("unknown import module '{module}' (importing '{field}')")]
    UnknownModule { module: String, field: String },

    /// The module exists but has no such function.
    #[error("module '{module}' has no function '{field}'")]
    UnknownField { module: String, field: String },

    /// Only `env.STACKTOP_ASM` is a recognized global import.
    #[error("global '{module}.{field}' not found")]
    UnknownGlobal { module: String, field: String },
}

/// Failure reading guest bytecode from disk.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
