//! Error types and traps
//!
//! Design: two kinds of failure, kept strictly apart.
//! - Recoverable conditions (allocation failure, bad arguments to the
//!   allocator, unparsable numbers) come back as typed errors.
//! - Programmer errors (bounds violations, refcount misuse, corrupted guard
//!   words, lock misuse) trap: the violation is logged and the thread panics.
//!   The release profile aborts on panic.

use std::fmt;
use thiserror::Error;

/// Errors returned by memory backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("alignment {0} is not a power of two at least the size of a pointer")]
    InvalidAlignment(usize),

    #[error("allocation size must be non-zero")]
    InvalidSize,

    #[error("out of memory allocating {0} bytes")]
    OutOfMemory(usize),

    #[error("allocation size overflows the address space")]
    Overflow,
}

impl MemoryError {
    /// The POSIX errno equivalent of this error
    pub fn errno(&self) -> i32 {
        match self {
            MemoryError::InvalidAlignment(_) | MemoryError::InvalidSize => libc::EINVAL,
            MemoryError::OutOfMemory(_) => libc::ENOMEM,
            MemoryError::Overflow => libc::ERANGE,
        }
    }
}

/// Errors returned by the numeric parsers of `Buffer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no digits at buffer position {0}")]
    NoDigits(usize),

    #[error("numeric value does not fit in 64 bits")]
    Overflow,
}

/// Classification of a trap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrapKind {
    IllegalValue,
    OutOfBounds,
    OutOfMemory,
    InvalidState,
    CorruptMemory,
    UnexpectedValue,
}

impl TrapKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrapKind::IllegalValue => "IllegalValue",
            TrapKind::OutOfBounds => "OutOfBounds",
            TrapKind::OutOfMemory => "OutOfMemory",
            TrapKind::InvalidState => "InvalidState",
            TrapKind::CorruptMemory => "CorruptMemory",
            TrapKind::UnexpectedValue => "UnexpectedValue",
        }
    }
}

impl fmt::Display for TrapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report a programmer error and unwind (or abort, in release builds)
///
/// Use the `trap!` and `trap_if!` macros rather than calling this directly;
/// they fill in the source location.
#[cold]
#[inline(never)]
pub fn trap(kind: TrapKind, message: fmt::Arguments<'_>, file: &'static str, line: u32) -> ! {
    let message = message.to_string();
    crate::logging::log_trap(kind, &message, file, line);
    panic!("{kind}: {message} at {file}:{line}");
}

/// Trap unconditionally
///
/// ```should_panic
/// parc::trap!(IllegalValue, "expected a non-null {}", "pointer");
/// ```
#[macro_export]
macro_rules! trap {
    ($kind:ident, $($arg:tt)+) => {
        $crate::error::trap(
            $crate::error::TrapKind::$kind,
            format_args!($($arg)+),
            file!(),
            line!(),
        )
    };
}

/// Trap when the condition holds
#[macro_export]
macro_rules! trap_if {
    ($cond:expr, $kind:ident, $($arg:tt)+) => {
        if $cond {
            $crate::trap!($kind, $($arg)+);
        }
    };
}
