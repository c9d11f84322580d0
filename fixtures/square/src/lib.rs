//! `mathx` native module used by the loader tests.

use arbor_hostapi::{export_module, ExecutionContext, NativeModule};

fn square(ctx: &mut dyn ExecutionContext) -> i64 {
    let x = ctx.local(0).unwrap_or(0);
    x.wrapping_mul(x)
}

fn build() -> NativeModule {
    NativeModule::new("mathx").with("square", square)
}

export_module!(build);
