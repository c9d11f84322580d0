//! Host-maintained shadow stack.
//!
//! Guest runtime support code keeps a stack pointer outside of linear memory
//! bookkeeping and manipulates it through four reserved `env` imports. The
//! host owns the pointer (`top`) and the list of saved pointers (`frames`).
//! `top` is never validated against guest memory bounds.

use crate::error::HostError;

/// Module name under which the shadow-stack primitives are reserved.
pub const RESERVED_MODULE: &str = "env";

/// Global import that exposes the current shadow-stack top.
pub const STACKTOP_GLOBAL: &str = "STACKTOP_ASM";

/// Auxiliary stack pointer plus saved-pointer history.
///
/// `frames` is used strictly LIFO. Popping with no saved frames is an
/// invariant violation and returns `Err(StackUnderflow)` without touching
/// `top`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShadowStack {
    top: i64,
    frames: Vec<i64>,
}

impl ShadowStack {
    /// Create a shadow stack whose pointer starts at `top`.
    pub fn new(top: i64) -> Self {
        Self {
            top,
            frames: Vec::new(),
        }
    }

    /// Save the current top. Returns `top` unchanged.
    pub fn push(&mut self) -> i64 {
        self.frames.push(self.top);
        self.top
    }

    /// Restore the most recently saved top and return it.
    pub fn pop(&mut self) -> Result<i64, HostError> {
        let saved = self.frames.pop().ok_or(HostError::StackUnderflow)?;
        self.top = saved;
        Ok(self.top)
    }

    /// Move the top by `delta` and return the new top.
    ///
    /// Wraps on overflow, matching two's-complement pointer arithmetic in
    /// the guest.
    pub fn increment(&mut self, delta: i64) -> i64 {
        self.top = self.top.wrapping_add(delta);
        self.top
    }

    /// Current top.
    pub fn top(&self) -> i64 {
        self.top
    }

    /// Saved frames, oldest first.
    pub fn frames(&self) -> &[i64] {
        &self.frames
    }

    /// Number of saved frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// One of the four reserved shadow-stack primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowOp {
    /// `env.__stackpush__`
    Push,
    /// `env.__stackpop__` or `env.__popstack__`
    Pop,
    /// `env.__incrementstack__`, delta taken from the first local.
    Increment,
    /// `env.__stacktop__`
    Top,
}

impl ShadowOp {
    /// Map a reserved `env` field name to its primitive.
    pub fn from_field(field: &str) -> Option<Self> {
        match field {
            "__stackpush__" => Some(Self::Push),
            "__stackpop__" | "__popstack__" => Some(Self::Pop),
            "__incrementstack__" => Some(Self::Increment),
            "__stacktop__" => Some(Self::Top),
            _ => None,
        }
    }

    /// Apply the primitive. `locals` are the calling frame's locals.
    ///
    /// A missing delta for `Increment` is treated as zero.
    pub fn apply(self, stack: &mut ShadowStack, locals: &[i64]) -> Result<i64, HostError> {
        match self {
            Self::Push => Ok(stack.push()),
            Self::Pop => stack.pop(),
            Self::Increment => Ok(stack.increment(locals.first().copied().unwrap_or(0))),
            Self::Top => Ok(stack.top()),
        }
    }
}
