//! Module registry: module name → `Module`.
//!
//! The registry is read on every import resolution and never mutated while
//! a resolution is in progress. Every entry is used through the `Module`
//! trait, whether it was registered statically or loaded from an artifact.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arbor_hostapi::{Extension, Module, NativeModule};
use tracing::{debug, warn};

/// Name-keyed set of modules available to guest imports.
///
/// Registering under a name that is already taken replaces the previous
/// module (last write wins) and logs a warning. Modules loaded from
/// artifacts keep their own library open, so anything handed out here
/// stays valid after the registry is dropped.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Box<dyn Module>>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    /// Add a module under its self-reported name.
    pub fn register_module(&mut self, module: Box<dyn Module>) -> Option<Box<dyn Module>> {
        let name = module.name().to_string();
        let previous = self.modules.insert(name.clone(), module);
        if previous.is_some() {
            warn!(module = %name, "module registered twice, previous registration shadowed");
        } else {
            debug!(module = %name, "module registered");
        }
        previous
    }

    /// Register a single extension as `module.field`, replacing only that
    /// field.
    ///
    /// Adds the field to the `NativeModule` already registered under
    /// `module`, creating one if needed. Any other module, such as one
    /// loaded from an artifact, is wrapped in an overlay that keeps serving
    /// its remaining fields.
    pub fn register(
        &mut self,
        module: &str,
        field: &str,
        extension: impl Extension + 'static,
    ) {
        let extension: Arc<dyn Extension> = Arc::new(extension);
        let mut native = match self.modules.remove(module) {
            Some(mut existing) => {
                if let Some(native) = existing.as_native_mut() {
                    native.register_arc(field, extension);
                    self.modules.insert(module.to_string(), existing);
                    return;
                }
                debug!(module, field, "overlaying field on foreign module");
                NativeModule::extending(existing)
            }
            None => NativeModule::new(module),
        };
        native.register_arc(field, extension);
        self.modules.insert(module.to_string(), Box::new(native));
        debug!(module, field, "extension registered");
    }

    /// Look up a module by name.
    pub fn get(&self, module: &str) -> Option<&dyn Module> {
        self.modules.get(module).map(|m| m.as_ref())
    }

    /// Look up `module.field`. Pure: never mutates the registry.
    pub fn resolve(&self, module: &str, field: &str) -> Option<Arc<dyn Extension>> {
        self.get(module)?.resolve(field)
    }

    /// True if a module is registered under `module`.
    pub fn contains(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    /// Registered module names, sorted.
    pub fn module_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// True if no modules are registered.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.module_names())
            .finish()
    }
}
