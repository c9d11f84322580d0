//! Diagnostic dump rendered when guest execution fails.
//!
//! Best-effort: the fields are a snapshot for humans, not part of the
//! error contract.

use std::fmt;

/// Snapshot of VM state around a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    /// Shadow-stack top.
    pub stack_top: i64,
    /// Saved shadow-stack frames, oldest first.
    pub frames: Vec<i64>,
    /// Configured memory bound in pages.
    pub max_memory_pages: u32,
    /// Current size of the guest memory, exported or imported, if any.
    pub memory_pages: Option<u64>,
    /// Engine backtrace captured from the trap.
    pub backtrace: Option<String>,
    /// The failure being reported.
    pub error: Option<String>,
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(error) = &self.error {
            writeln!(f, "error: {}", error)?;
        }
        writeln!(f, "shadow stack:")?;
        writeln!(f, "  top: {}", self.stack_top)?;
        if self.frames.is_empty() {
            writeln!(f, "  frames: (none)")?;
        } else {
            writeln!(f, "  frames ({}):", self.frames.len())?;
            for (depth, frame) in self.frames.iter().rev().enumerate() {
                writeln!(f, "    #{}: {}", depth, frame)?;
            }
        }
        writeln!(f, "memory:")?;
        match self.memory_pages {
            Some(pages) => writeln!(f, "  pages: {} / {}", pages, self.max_memory_pages)?,
            None => writeln!(f, "  pages: (no linear memory) / {}", self.max_memory_pages)?,
        }
        match &self.backtrace {
            Some(bt) => write!(f, "wasm backtrace:\n{}", bt),
            None => write!(f, "wasm backtrace: (unavailable)"),
        }
    }
}
