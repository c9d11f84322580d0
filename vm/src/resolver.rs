//! Import resolution.
//!
//! Turns a guest import `(module, field)` into something the linker can
//! bind. Reserved `env` shadow-stack names always win over the registry,
//! even when a registered module is itself called `env`. Anything the
//! registry cannot answer is a `ResolutionError`, which stops
//! instantiation.

use std::fmt;
use std::sync::Arc;

use arbor_hostapi::{Extension, ShadowOp, RESERVED_MODULE, STACKTOP_GLOBAL};
use tracing::debug;

use crate::error::ResolutionError;
use crate::registry::ModuleRegistry;

/// What a function import is bound to.
#[derive(Clone)]
pub enum Binding {
    /// One of the built-in shadow-stack primitives.
    Primitive(ShadowOp),
    /// An extension from a registered module.
    Extension(Arc<dyn Extension>),
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(op) => f.debug_tuple("Primitive").field(op).finish(),
            Self::Extension(_) => f.write_str("Extension(..)"),
        }
    }
}

/// The resolver capability the linker calls back into.
pub trait ImportResolver {
    /// Resolve a function import.
    fn resolve_function(&self, module: &str, field: &str) -> Result<Binding, ResolutionError>;

    /// Resolve a global import to its initial value.
    fn resolve_global(&self, module: &str, field: &str) -> Result<i64, ResolutionError>;
}

/// Resolves against a registry and the current shadow-stack top.
pub struct HostResolver<'a> {
    registry: &'a ModuleRegistry,
    stack_top: i64,
}

impl<'a> HostResolver<'a> {
    pub fn new(registry: &'a ModuleRegistry, stack_top: i64) -> Self {
        Self {
            registry,
            stack_top,
        }
    }
}

impl ImportResolver for HostResolver<'_> {
    fn resolve_function(&self, module: &str, field: &str) -> Result<Binding, ResolutionError> {
        if module == RESERVED_MODULE {
            if let Some(op) = ShadowOp::from_field(field) {
                debug!(module, field, ?op, "resolved shadow-stack primitive");
                return Ok(Binding::Primitive(op));
            }
        }

        let resolved = self
            .registry
            .get(module)
            .ok_or_else(|| ResolutionError::UnknownModule {
                module: module.to_string(),
                field: field.to_string(),
            })?;

        let extension = resolved
            .resolve(field)
            .ok_or_else(|| ResolutionError::UnknownField {
                module: module.to_string(),
                field: field.to_string(),
            })?;

        debug!(module, field, "resolved extension");
        Ok(Binding::Extension(extension))
    }

    fn resolve_global(&self, module: &str, field: &str) -> Result<i64, ResolutionError> {
        if module == RESERVED_MODULE && field == STACKTOP_GLOBAL {
            return Ok(self.stack_top);
        }
        Err(ResolutionError::UnknownGlobal {
            module: module.to_string(),
            field: field.to_string(),
        })
    }
}
