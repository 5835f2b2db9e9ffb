//! Trapping integer division and checked float-to-integer conversion.
//!
//! Generated code calls these where the target ISA would not trap (or would
//! trap with a signal we cannot turn into the runtime's failure path).

use crate::fail::{FailFastReason, fail_fast};

macro_rules! signed_division {
    ($div:ident, $rem:ident, $ty:ty) => {
        pub fn $div(dividend: $ty, divisor: $ty) -> $ty {
            if divisor == 0 {
                fail_fast(FailFastReason::DivideByZero);
            }
            dividend
                .checked_div(divisor)
                .unwrap_or_else(|| fail_fast(FailFastReason::Overflow))
        }

        pub fn $rem(dividend: $ty, divisor: $ty) -> $ty {
            if divisor == 0 {
                fail_fast(FailFastReason::DivideByZero);
            }
            dividend
                .checked_rem(divisor)
                .unwrap_or_else(|| fail_fast(FailFastReason::Overflow))
        }
    };
}

macro_rules! unsigned_division {
    ($div:ident, $rem:ident, $ty:ty) => {
        pub fn $div(dividend: $ty, divisor: $ty) -> $ty {
            if divisor == 0 {
                fail_fast(FailFastReason::DivideByZero);
            }
            dividend / divisor
        }

        pub fn $rem(dividend: $ty, divisor: $ty) -> $ty {
            if divisor == 0 {
                fail_fast(FailFastReason::DivideByZero);
            }
            dividend % divisor
        }
    };
}

signed_division!(div_i32, mod_i32, i32);
signed_division!(div_i64, mod_i64, i64);
unsigned_division!(div_u32, mod_u32, u32);
unsigned_division!(div_u64, mod_u64, u64);

// Open bounds: a value converts iff it lies strictly between `low` and
// `high` after truncation toward zero. NaN fails every comparison.
macro_rules! checked_conversion {
    ($name:ident, $ty:ty, low: $low:expr, high: $high:expr) => {
        pub fn $name(value: f64) -> $ty {
            if value > $low && value < $high {
                value as $ty
            } else {
                fail_fast(FailFastReason::Overflow)
            }
        }
    };
}

checked_conversion!(f64_to_i32_checked, i32, low: -2_147_483_649.0, high: 2_147_483_648.0);
checked_conversion!(f64_to_u32_checked, u32, low: -1.0, high: 4_294_967_296.0);
checked_conversion!(f64_to_u64_checked, u64, low: -1.0, high: 18_446_744_073_709_551_616.0);

/// `i64::MIN` is exactly representable, so the low bound is inclusive.
pub fn f64_to_i64_checked(value: f64) -> i64 {
    if value >= -9_223_372_036_854_775_808.0 && value < 9_223_372_036_854_775_808.0 {
        value as i64
    } else {
        fail_fast(FailFastReason::Overflow)
    }
}

// =============================================================================
// Exported entry points
// =============================================================================

macro_rules! export {
    ($($symbol:ident => $func:ident($($arg:ident: $ty:ty),*) -> $ret:ty;)*) => {
        $(
            #[doc = concat!("Signature: `(", stringify!($($ty),*), ") -> ", stringify!($ret), "`")]
            #[unsafe(no_mangle)]
            pub extern "C" fn $symbol($($arg: $ty),*) -> $ret {
                $func($($arg),*)
            }
        )*
    };
}

export! {
    __barert_div_i32 => div_i32(a: i32, b: i32) -> i32;
    __barert_mod_i32 => mod_i32(a: i32, b: i32) -> i32;
    __barert_div_i64 => div_i64(a: i64, b: i64) -> i64;
    __barert_mod_i64 => mod_i64(a: i64, b: i64) -> i64;
    __barert_div_u32 => div_u32(a: u32, b: u32) -> u32;
    __barert_mod_u32 => mod_u32(a: u32, b: u32) -> u32;
    __barert_div_u64 => div_u64(a: u64, b: u64) -> u64;
    __barert_mod_u64 => mod_u64(a: u64, b: u64) -> u64;
    __barert_f64_to_i32_checked => f64_to_i32_checked(value: f64) -> i32;
    __barert_f64_to_u32_checked => f64_to_u32_checked(value: f64) -> u32;
    __barert_f64_to_i64_checked => f64_to_i64_checked(value: f64) -> i64;
    __barert_f64_to_u64_checked => f64_to_u64_checked(value: f64) -> u64;
}
