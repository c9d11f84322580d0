//! Native module loader.
//!
//! Opens a shared-library artifact, reads its `ModuleDeclaration`, checks it
//! against this host's ABI, and constructs the module. The module's code
//! and vtables live in the library, so the returned `LoadedModule` and every
//! extension resolved from it hold the library open.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arbor_hostapi::{ExecutionContext, Extension, Module, ModuleDeclaration, MODULE_SYMBOL};
use libloading::Library;
use tracing::info;

use crate::error::LoadError;
use crate::registry::ModuleRegistry;

/// A module constructed from an artifact.
pub struct LoadedModule {
    // Dropped before `library`.
    module: Box<dyn Module>,
    library: Arc<Library>,
    path: PathBuf,
}

impl LoadedModule {
    /// The artifact this module was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Module for LoadedModule {
    fn name(&self) -> &str {
        self.module.name()
    }

    fn resolve(&self, field: &str) -> Option<Arc<dyn Extension>> {
        let extension = self.module.resolve(field)?;
        Some(Arc::new(LibraryExtension {
            extension,
            _library: Arc::clone(&self.library),
        }))
    }

    fn fields(&self) -> Vec<String> {
        self.module.fields()
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.module.name())
            .field("path", &self.path)
            .finish()
    }
}

/// An extension from a loaded library, holding the library open.
struct LibraryExtension {
    // Dropped before `_library`.
    extension: Arc<dyn Extension>,
    _library: Arc<Library>,
}

impl Extension for LibraryExtension {
    fn run(&self, ctx: &mut dyn ExecutionContext) -> i64 {
        self.extension.run(ctx)
    }
}

/// Load one native module artifact.
pub fn load_module(path: &Path) -> Result<LoadedModule, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let library = unsafe { Library::new(path) }.map_err(|e| LoadError::Open {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let declaration: ModuleDeclaration = unsafe {
        let symbol = library
            .get::<*const ModuleDeclaration>(MODULE_SYMBOL)
            .map_err(|_| LoadError::MissingExport {
                path: path.to_path_buf(),
                symbol: symbol_name(),
            })?;
        (*symbol).read()
    };

    check_declaration(path, &declaration)?;

    let module = (declaration.constructor)();
    info!(path = %path.display(), module = module.name(), "loaded native module");
    Ok(LoadedModule {
        module,
        library: Arc::new(library),
        path: path.to_path_buf(),
    })
}

/// Reject declarations built against a different host API.
pub fn check_declaration(path: &Path, declaration: &ModuleDeclaration) -> Result<(), LoadError> {
    match declaration.incompatibility() {
        Some(reason) => Err(LoadError::Incompatible {
            path: path.to_path_buf(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Load each artifact in order into `registry`, stopping at the first
/// failure. Modules loaded before the failure stay registered.
pub fn load_modules<P: AsRef<Path>>(
    paths: &[P],
    registry: &mut ModuleRegistry,
) -> Result<(), LoadError> {
    for path in paths {
        let loaded = load_module(path.as_ref())?;
        registry.register_module(Box::new(loaded));
    }
    Ok(())
}

fn symbol_name() -> String {
    let trimmed = MODULE_SYMBOL.strip_suffix(b"\0").unwrap_or(MODULE_SYMBOL);
    String::from_utf8_lossy(trimmed).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_hostapi::{ABI_VERSION, CORE_VERSION, NativeModule};

    fn build() -> Box<dyn Module> {
        Box::new(NativeModule::new("mathx"))
    }

    #[test]
    fn test_missing_artifact() {
        let err = load_module(Path::new("/nonexistent/libmathx.so")).err().unwrap();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }

    #[test]
    fn test_non_library_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("libfake.so");
        std::fs::write(&path, b"not a shared library").unwrap();
        let err = load_module(&path).err().unwrap();
        assert!(matches!(err, LoadError::Open { .. }), "got {:?}", err);
    }

    #[test]
    fn test_check_declaration() {
        let path = Path::new("libmathx.so");
        let ok = ModuleDeclaration {
            abi_version: ABI_VERSION,
            core_version: CORE_VERSION,
            constructor: build,
        };
        check_declaration(path, &ok).unwrap();

        let stale = ModuleDeclaration {
            abi_version: ABI_VERSION + 7,
            ..ok
        };
        let err = check_declaration(path, &stale).unwrap_err();
        assert!(matches!(err, LoadError::Incompatible { .. }));
    }

    #[test]
    fn test_load_modules_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("libbad.so");
        std::fs::write(&bad, b"garbage").unwrap();
        let missing = dir.path().join("libmissing.so");

        let mut registry = ModuleRegistry::new();
        registry.register("static", "f", |_: &mut dyn arbor_hostapi::ExecutionContext| 0);
        let err = load_modules(&[bad, missing], &mut registry).unwrap_err();

        // fails on the first path, never reaches the second
        assert!(matches!(err, LoadError::Open { .. }));
        assert_eq!(registry.len(), 1);
        // earlier registrations are untouched
        assert!(registry.contains("static"));
    }

    #[test]
    fn test_symbol_name() {
        assert_eq!(symbol_name(), "arbor_module_declaration");
    }
}
