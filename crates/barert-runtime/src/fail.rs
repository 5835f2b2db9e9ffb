//! Fail-fast: the runtime's only error path.
//!
//! There is no unwinding and no catchable error. Every contract violation
//! (bad index, bad length, covariance, arithmetic trap, unloadable module,
//! ...) ends the process. In builds with `panic = "abort"` the platform
//! backend terminates directly; elsewhere (tests, host tooling) the failure
//! surfaces as a panic carrying the reason text.

use core::fmt;

use derive_more::{Display, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum FailFastReason {
    #[display("index out of range")]
    IndexOutOfRange,

    #[display("negative or overflowing array length")]
    InvalidArrayLength,

    #[display("out of memory")]
    OutOfMemory,

    #[display("array covariance violation")]
    ArrayCovariance,

    #[display("element size mismatch")]
    ElementSizeMismatch,

    #[display("division by zero")]
    DivideByZero,

    #[display("arithmetic overflow")]
    Overflow,

    #[display("non-ASCII byte in narrow text")]
    NonAsciiText,

    #[display("malformed UTF-8 in narrow text")]
    InvalidUtf8,

    #[display("unable to load module")]
    ModuleNotFound,

    #[display("unable to resolve symbol")]
    SymbolNotFound,

    #[display("unrecognized terminal input sequence")]
    UnrecognizedInput,

    #[display("operation not supported on this platform")]
    PlatformNotSupported,

    #[display("fail-fast requested")]
    Requested,

    #[display("runtime panic")]
    Panic,
}

/// Terminate the process. Never returns.
#[cold]
#[inline(never)]
pub fn fail_fast(reason: FailFastReason) -> ! {
    tracing::error!(%reason, "fail-fast");
    terminate(reason)
}

#[cfg(panic = "abort")]
fn terminate(reason: FailFastReason) -> ! {
    crate::platform::current::fail_fast(reason)
}

#[cfg(not(panic = "abort"))]
fn terminate(reason: FailFastReason) -> ! {
    panic!("fail-fast: {reason}")
}

// =============================================================================
// Message formatting
// =============================================================================

const MESSAGE_CAPACITY: usize = 96;

/// Fixed-capacity sink for fail-fast messages. Output past the capacity is
/// dropped.
pub(crate) struct MessageBuf {
    bytes: [u8; MESSAGE_CAPACITY],
    len: usize,
}

impl MessageBuf {
    pub(crate) const fn new() -> Self {
        Self {
            bytes: [0; MESSAGE_CAPACITY],
            len: 0,
        }
    }

    /// `"fail-fast: <reason>\n"`
    pub(crate) fn for_reason(reason: FailFastReason) -> Self {
        let mut buf = Self::new();
        let _ = fmt::Write::write_fmt(&mut buf, format_args!("fail-fast: {reason}\n"));
        buf
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl fmt::Write for MessageBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = MESSAGE_CAPACITY - self.len;
        let take = s.len().min(room);
        self.bytes[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

// =============================================================================
// Exported entry points
// =============================================================================

/// Fail-fast with no message, for code generation's last-resort paths.
///
/// Signature: `() -> !`
#[unsafe(no_mangle)]
pub extern "C" fn __barert_fail_fast() -> ! {
    fail_fast(FailFastReason::Requested)
}

/// Signature: `() -> !`
#[unsafe(no_mangle)]
pub extern "C" fn __barert_throw_index_out_of_range() -> ! {
    fail_fast(FailFastReason::IndexOutOfRange)
}

/// Signature: `() -> !`
#[unsafe(no_mangle)]
pub extern "C" fn __barert_throw_divide_by_zero() -> ! {
    fail_fast(FailFastReason::DivideByZero)
}

/// Signature: `() -> !`
#[unsafe(no_mangle)]
pub extern "C" fn __barert_throw_overflow() -> ! {
    fail_fast(FailFastReason::Overflow)
}

/// Signature: `() -> !`
#[unsafe(no_mangle)]
pub extern "C" fn __barert_throw_platform_not_supported() -> ! {
    fail_fast(FailFastReason::PlatformNotSupported)
}
