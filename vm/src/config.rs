//! VM configuration.

/// Configuration for an Arbor VM.
///
/// Controls guest resource bounds and the initial shadow-stack pointer.
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Maximum linear memory pages (1 page = 64 KiB).
    /// Default: 256 pages = 16 MiB.
    pub max_memory_pages: u32,

    /// Shadow-stack top before the guest runs.
    pub initial_stack_top: i64,

    /// Capture WASM backtraces on traps for the diagnostic dump.
    pub wasm_backtrace: bool,
}

impl VmConfig {
    /// Configured memory bound in bytes.
    pub fn max_memory_bytes(&self) -> usize {
        (self.max_memory_pages as usize) * 65536
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_memory_pages: 256,       // 16 MiB
            initial_stack_top: 0,
            wasm_backtrace: true,
        }
    }
}
