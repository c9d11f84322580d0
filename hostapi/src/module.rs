//! Default `Module` implementation backed by a field map.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::traits::{Extension, Module};

/// A module built by registering extensions one field at a time.
///
/// Registering a field that already exists replaces it (last write wins).
/// A module created with [`extending`](Self::extending) answers its own
/// fields first and falls back to the base module for the rest.
#[derive(Clone, Default)]
pub struct NativeModule {
    name: String,
    extensions: HashMap<String, Arc<dyn Extension>>,
    base: Option<Arc<dyn Module>>,
}

impl NativeModule {
    /// Create an empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extensions: HashMap::new(),
            base: None,
        }
    }

    /// Create an overlay over `base`, taking its name.
    pub fn extending(base: Box<dyn Module>) -> Self {
        Self {
            name: base.name().to_string(),
            extensions: HashMap::new(),
            base: Some(Arc::from(base)),
        }
    }

    /// Register `extension` under `field`, returning the one it replaced.
    pub fn register(
        &mut self,
        field: impl Into<String>,
        extension: impl Extension + 'static,
    ) -> Option<Arc<dyn Extension>> {
        self.register_arc(field, Arc::new(extension))
    }

    /// Register an already shared extension.
    pub fn register_arc(
        &mut self,
        field: impl Into<String>,
        extension: Arc<dyn Extension>,
    ) -> Option<Arc<dyn Extension>> {
        self.extensions.insert(field.into(), extension)
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, field: impl Into<String>, extension: impl Extension + 'static) -> Self {
        self.register(field, extension);
        self
    }

    /// Number of fields registered directly on this module.
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// True if no fields are registered directly on this module.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// The module this one overlays, if any.
    pub fn base(&self) -> Option<&dyn Module> {
        self.base.as_deref()
    }
}

impl Module for NativeModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, field: &str) -> Option<Arc<dyn Extension>> {
        match self.extensions.get(field) {
            Some(extension) => Some(Arc::clone(extension)),
            None => self.base.as_ref()?.resolve(field),
        }
    }

    fn fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self.extensions.keys().cloned().collect();
        if let Some(base) = &self.base {
            fields.extend(base.fields());
        }
        fields.sort();
        fields.dedup();
        fields
    }

    fn as_native_mut(&mut self) -> Option<&mut NativeModule> {
        Some(self)
    }
}

impl fmt::Debug for NativeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeModule")
            .field("name", &self.name)
            .field("fields", &self.fields())
            .field("overlay", &self.base.is_some())
            .finish()
    }
}
