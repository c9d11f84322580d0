//! A second `mathx` module, for same-name override tests.

use arbor_hostapi::{export_module, ExecutionContext, NativeModule};

const OFFSET: i64 = 1000;

fn square(ctx: &mut dyn ExecutionContext) -> i64 {
    ctx.local(0).unwrap_or(0).wrapping_add(OFFSET)
}

fn build() -> NativeModule {
    NativeModule::new("mathx")
        .with("square", square)
        .with("offset", |_: &mut dyn ExecutionContext| OFFSET)
}

export_module!(build);
