//! Clock and sleep.

use crate::platform;

/// Block the (only) thread for `milliseconds`. Negative durations are
/// treated as zero.
pub fn sleep(milliseconds: i32) {
    platform::sleep(milliseconds.max(0) as u32);
}

/// Milliseconds since an arbitrary, platform-defined origin.
pub fn tick_count64() -> i64 {
    platform::tick_count64()
}

/// Signature: `(milliseconds: i32) -> ()`
#[unsafe(no_mangle)]
pub extern "C" fn __barert_sleep(milliseconds: i32) {
    sleep(milliseconds);
}

/// Signature: `() -> i64`
#[unsafe(no_mangle)]
pub extern "C" fn __barert_tick_count64() -> i64 {
    tick_count64()
}
