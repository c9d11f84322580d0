//! Shared test helpers for integration tests.
//!
//! Provides guest WAT fixtures, a registry preloaded with the `mathx`
//! module, native module artifacts built from `fixtures/`, and VM factory
//! functions used across all integration test files.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, Once};

use arbor_hostapi::{ExecutionContext, NativeModule};
use arbor_vm::{ModuleRegistry, Vm, VmConfig, VmError};

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness writer.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

// ── Modules ──

/// `mathx.square(x) = x * x`
pub fn square(ctx: &mut dyn ExecutionContext) -> i64 {
    let x = ctx.local(0).unwrap_or(0);
    x.wrapping_mul(x)
}

/// `mathx` with `square` and `add`.
pub fn mathx() -> NativeModule {
    NativeModule::new("mathx")
        .with("square", square)
        .with("add", |ctx: &mut dyn ExecutionContext| {
            ctx.local(0).unwrap_or(0).wrapping_add(ctx.local(1).unwrap_or(0))
        })
}

/// A registry holding only `mathx`.
pub fn mathx_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register_module(Box::new(mathx()));
    registry
}

// ── Native module artifacts ──

/// `mathx` with `square(x) = x * x`.
pub const SQUARE_ARTIFACT: &str = "arbor-fixture-square";

/// `mathx` with `square(x) = x + 1000` and `offset() = 1000`.
pub const OFFSET_ARTIFACT: &str = "arbor-fixture-offset";

/// A shared library with no module declaration.
pub const BARE_ARTIFACT: &str = "arbor-fixture-bare";

static ARTIFACTS: Mutex<Option<HashMap<&'static str, PathBuf>>> = Mutex::new(None);

/// Build the fixture package `package` as a cdylib and return its path.
///
/// Each package is built once per test binary, into a target directory of
/// its own so the outer `cargo test` build is never contended.
pub fn artifact(package: &'static str) -> PathBuf {
    let mut built = ARTIFACTS.lock().unwrap();
    let built = built.get_or_insert_with(HashMap::new);
    if let Some(path) = built.get(package) {
        return path.clone();
    }

    let workspace = Path::new(env!("CARGO_MANIFEST_DIR")).join("..");
    let target_dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join("fixtures");
    let cargo = std::env::var_os("CARGO").unwrap_or_else(|| "cargo".into());
    let status = Command::new(cargo)
        .arg("build")
        .arg("--quiet")
        .arg("--manifest-path")
        .arg(workspace.join("Cargo.toml"))
        .arg("--package")
        .arg(package)
        .arg("--target-dir")
        .arg(&target_dir)
        .status()
        .expect("spawn cargo");
    assert!(status.success(), "building {} failed", package);

    let path = target_dir
        .join("debug")
        .join(libloading::library_filename(package.replace('-', "_")));
    assert!(path.exists(), "{} not produced", path.display());
    built.insert(package, path.clone());
    path
}

// ── VM factories ──

/// Build a VM for `wat` with entrypoint `main` against `registry`.
pub fn vm_with(wat: &str, registry: ModuleRegistry) -> Result<Vm, VmError> {
    init_tracing();
    Vm::with_registry::<&str>(wat.as_bytes(), "main", registry, &[], VmConfig::default())
}

/// Build a VM for `wat` with an empty registry.
pub fn vm(wat: &str) -> Result<Vm, VmError> {
    vm_with(wat, ModuleRegistry::new())
}

// ── Guests ──

/// Push, grow the frame by 16, then pop: returns the restored top.
pub const SHADOW_ROUNDTRIP: &str = r#"
    (module
        (import "env" "__stackpush__" (func $push (result i64)))
        (import "env" "__incrementstack__" (func $inc (param i64) (result i64)))
        (import "env" "__stackpop__" (func $pop (result i64)))
        (func (export "main") (result i64)
            call $push
            drop
            i64.const 16
            call $inc
            drop
            call $pop)
    )
"#;

/// Pops with nothing saved.
pub const SHADOW_UNDERFLOW: &str = r#"
    (module
        (import "env" "__popstack__" (func $pop (result i64)))
        (memory (export "memory") 1)
        (func (export "main") (result i64)
            call $pop)
    )
"#;

/// Calls `mathx.square(7)`.
pub const SQUARE_SEVEN: &str = r#"
    (module
        (import "mathx" "square" (func $square (param i64) (result i64)))
        (func (export "main") (result i64)
            i64.const 7
            call $square)
    )
"#;

/// Imports a field `mathx` does not provide.
pub const CUBE_IMPORT: &str = r#"
    (module
        (import "mathx" "cube" (func $cube (param i64) (result i64)))
        (func (export "main") (result i64)
            i64.const 3
            call $cube)
    )
"#;
