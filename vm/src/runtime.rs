//! VM runtime — Wasmtime engine, native module loading, import linking,
//! and entrypoint execution.
//!
//! Construction loads every native module first, then instantiates the
//! guest with this VM's registry as the import resolver. The entrypoint is
//! looked up on each `run`, so a reloaded guest rebinds it.

use std::fmt;
use std::path::Path;

use arbor_hostapi::{HostError, Module};
use tracing::{error, info};
use wasmtime::{Config, Engine, Instance, Module as WasmModule, Store, Trap, Val, WasmBacktrace};

use crate::config::VmConfig;
use crate::diagnostics::Diagnostics;
use crate::error::VmError;
use crate::host_impl::{val_to_i64, VmState};
use crate::linker::link_imports;
use crate::loader;
use crate::registry::ModuleRegistry;
use crate::resolver::HostResolver;
use crate::validation::validate_module;

/// The Arbor virtual machine.
///
/// One VM drives one guest execution at a time; it is not meant to be
/// shared across threads.
pub struct Vm {
    engine: Engine,
    config: VmConfig,
    entrypoint: String,
    store: Store<VmState>,
    instance: Instance,
    registry: ModuleRegistry,
    last_failure: Option<Diagnostics>,
}

impl Vm {
    /// Create a VM from guest bytecode, loading native modules from
    /// `module_paths` before the guest is instantiated.
    pub fn new<P: AsRef<Path>>(
        bytecode: &[u8],
        entrypoint: &str,
        module_paths: &[P],
        config: VmConfig,
    ) -> Result<Self, VmError> {
        Self::with_registry(bytecode, entrypoint, ModuleRegistry::new(), module_paths, config)
    }

    /// Like [`new`](Self::new), starting from a registry that already holds
    /// statically registered modules.
    pub fn with_registry<P: AsRef<Path>>(
        bytecode: &[u8],
        entrypoint: &str,
        mut registry: ModuleRegistry,
        module_paths: &[P],
        config: VmConfig,
    ) -> Result<Self, VmError> {
        loader::load_modules(module_paths, &mut registry)?;

        let engine = create_engine(&config)?;
        let module = compile(&engine, bytecode)?;
        let (store, instance) = instantiate(&engine, &module, &registry, &config)?;
        info!(entrypoint, modules = ?registry.module_names(), "guest instantiated");

        Ok(Self {
            engine,
            config,
            entrypoint: entrypoint.to_string(),
            store,
            instance,
            registry,
            last_failure: None,
        })
    }

    /// Run the entrypoint and return its result widened to `i64`.
    ///
    /// On an engine failure the diagnostic dump is captured (see
    /// [`last_failure`](Self::last_failure)) before the error is returned.
    pub fn run(&mut self) -> Result<i64, VmError> {
        let func = self
            .instance
            .get_func(&mut self.store, &self.entrypoint)
            .ok_or_else(|| VmError::EntrypointNotFound(self.entrypoint.clone()))?;

        let ty = func.ty(&self.store);
        if ty.params().len() != 0 {
            return Err(VmError::ValidationError(format!(
                "entry function '{}' takes {} params, expected none",
                self.entrypoint,
                ty.params().len()
            )));
        }

        self.last_failure = None;
        let mut results = vec![Val::I64(0); ty.results().len()];
        match func.call(&mut self.store, &[], &mut results) {
            Ok(()) => Ok(results.first().map(val_to_i64).unwrap_or(0)),
            Err(e) => {
                let err = classify(&e);
                let mut dump = self.diagnostics();
                dump.backtrace = e.downcast_ref::<WasmBacktrace>().map(|bt| bt.to_string());
                dump.error = Some(err.to_string());
                error!(entrypoint = %self.entrypoint, "guest execution failed\n{}", dump);
                self.last_failure = Some(dump);
                Err(err)
            }
        }
    }

    /// Replace the guest module and resolve its imports against the
    /// current registry. The shadow stack starts over.
    pub fn reload(&mut self, bytecode: &[u8]) -> Result<(), VmError> {
        let module = compile(&self.engine, bytecode)?;
        let (store, instance) = instantiate(&self.engine, &module, &self.registry, &self.config)?;
        self.store = store;
        self.instance = instance;
        self.last_failure = None;
        info!(entrypoint = %self.entrypoint, "guest reloaded");
        Ok(())
    }

    /// Load a native module artifact into the registry. Guests see it from
    /// the next [`reload`](Self::reload).
    pub fn load_module(&mut self, path: &Path) -> Result<(), VmError> {
        let loaded = loader::load_module(path)?;
        self.registry.register_module(Box::new(loaded));
        Ok(())
    }

    /// Load several artifacts in order, stopping at the first failure.
    pub fn load_modules<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<(), VmError> {
        loader::load_modules(paths, &mut self.registry)?;
        Ok(())
    }

    /// Register a statically built module. Guests see it from the next
    /// [`reload`](Self::reload).
    pub fn register_module(&mut self, module: Box<dyn Module>) {
        self.registry.register_module(module);
    }

    /// Point `run` at a different export.
    pub fn set_entrypoint(&mut self, entrypoint: &str) {
        self.entrypoint = entrypoint.to_string();
    }

    /// Snapshot of the current VM state.
    pub fn diagnostics(&mut self) -> Diagnostics {
        let memory_pages = self
            .instance
            .get_memory(&mut self.store, "memory")
            .or(self.store.data().imported_memory)
            .map(|m| m.size(&self.store));
        let shadow = &self.store.data().shadow;
        Diagnostics {
            stack_top: shadow.top(),
            frames: shadow.frames().to_vec(),
            max_memory_pages: self.config.max_memory_pages,
            memory_pages,
            backtrace: None,
            error: None,
        }
    }

    /// The dump captured by the last failed `run`, if any.
    pub fn last_failure(&self) -> Option<&Diagnostics> {
        self.last_failure.as_ref()
    }

    /// Write the last failure's dump to stderr.
    pub fn print_stack_trace(&self) {
        if let Some(dump) = &self.last_failure {
            eprintln!("{}", dump);
        }
    }

    pub fn entrypoint(&self) -> &str {
        &self.entrypoint
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Current shadow-stack top.
    pub fn stack_top(&self) -> i64 {
        self.store.data().shadow.top()
    }

    /// Saved shadow-stack frames, oldest first.
    pub fn shadow_frames(&self) -> &[i64] {
        self.store.data().shadow.frames()
    }

    /// Extension calls currently in progress. Zero whenever `run` is not
    /// on the stack.
    pub fn active_calls(&self) -> usize {
        self.store.data().active_calls
    }

    /// Extension calls made since the guest was last instantiated.
    pub fn extension_calls(&self) -> u64 {
        self.store.data().extension_calls
    }
}

impl fmt::Debug for Vm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vm")
            .field("entrypoint", &self.entrypoint)
            .field("registry", &self.registry)
            .field("stack_top", &self.stack_top())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Construct, run, and report. On failure the stack trace is printed before
/// the error is returned.
pub fn run_wasm<P: AsRef<Path>>(
    bytecode: &[u8],
    entrypoint: &str,
    module_paths: &[P],
) -> Result<i64, VmError> {
    let mut vm = Vm::new(bytecode, entrypoint, module_paths, VmConfig::default())?;
    match vm.run() {
        Ok(value) => Ok(value),
        Err(e) => {
            vm.print_stack_trace();
            Err(e)
        }
    }
}

/// Create a Wasmtime engine.
fn create_engine(config: &VmConfig) -> Result<Engine, VmError> {
    let mut wasm_config = Config::new();
    wasm_config.wasm_backtrace(config.wasm_backtrace);
    Ok(Engine::new(&wasm_config)?)
}

fn compile(engine: &Engine, bytecode: &[u8]) -> Result<WasmModule, VmError> {
    let module = WasmModule::new(engine, bytecode)?;
    validate_module(&module)?;
    Ok(module)
}

/// Resolve every import and instantiate the guest in a fresh store.
fn instantiate(
    engine: &Engine,
    module: &WasmModule,
    registry: &ModuleRegistry,
    config: &VmConfig,
) -> Result<(Store<VmState>, Instance), VmError> {
    let mut store = Store::new(engine, VmState::new(config));
    store.limiter(|state| &mut state.limits);

    let resolver = HostResolver::new(registry, store.data().shadow.top());
    let imports = link_imports(&mut store, module, &resolver)?;

    let instance = Instance::new(&mut store, module, &imports)?;
    Ok((store, instance))
}

/// Map an engine error from a guest call to a `VmError`.
///
/// Host primitive failures → `VmError::Host`
/// Out-of-bounds memory access → `VmError::MemoryError`
/// Other traps → `VmError::GuestTrapped`
fn classify(err: &anyhow::Error) -> VmError {
    if let Some(host) = err.downcast_ref::<HostError>() {
        return VmError::Host(host.clone());
    }
    match err.downcast_ref::<Trap>() {
        Some(Trap::MemoryOutOfBounds) => VmError::MemoryError(Trap::MemoryOutOfBounds.to_string()),
        Some(trap) => VmError::GuestTrapped(trap.to_string()),
        None => VmError::GuestTrapped(format!("{:#}", err)),
    }
}
