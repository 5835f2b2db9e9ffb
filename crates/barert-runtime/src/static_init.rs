//! Lazy static constructors.
//!
//! Not thread-safe: two threads racing on the same context may both see it
//! pending. A recursive touch from inside the constructor finds the flag
//! already set and returns at once.

use barert_abi::StaticClassConstructionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Pending,
    Initialized,
}

/// # Safety
///
/// `ctx` must point at a live context.
pub unsafe fn state(ctx: *const StaticClassConstructionContext) -> InitState {
    match unsafe { (*ctx).initialized } {
        0 => InitState::Pending,
        _ => InitState::Initialized,
    }
}

/// Run the context's constructor if it has not run yet.
///
/// # Safety
///
/// `ctx` must point at a live context whose initializer (if any) is safe
/// to call.
pub unsafe fn ensure_initialized(ctx: *mut StaticClassConstructionContext) {
    // No reference into `ctx` is held across the call: the constructor may
    // touch the same context.
    let initializer = unsafe {
        if (*ctx).initialized == 1 {
            return;
        }
        (*ctx).initialized = 1;
        (*ctx).initializer
    };
    if let Some(initializer) = initializer {
        tracing::trace!(initializer = ?(initializer as *const ()), "running static constructor");
        unsafe { initializer() };
    }
}

/// Signature: `(ctx: ptr) -> ()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_check_static_ctor(ctx: *mut StaticClassConstructionContext) {
    unsafe { ensure_initialized(ctx) }
}

/// Check the constructor, then hand back the non-GC static base so the
/// caller can address the statics in one step.
///
/// Signature: `(ctx: ptr, base: ptr) -> ptr`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_check_static_ctor_return_base(
    ctx: *mut StaticClassConstructionContext,
    base: *mut u8,
) -> *mut u8 {
    unsafe { ensure_initialized(ctx) };
    base
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    thread_local! {
        static RUNS: Cell<u32> = const { Cell::new(0) };
        static REENTRANT: Cell<*mut StaticClassConstructionContext> = const { Cell::new(core::ptr::null_mut()) };
    }

    unsafe extern "C" fn count_run() {
        RUNS.with(|runs| runs.set(runs.get() + 1));
    }

    unsafe extern "C" fn touch_self() {
        unsafe { count_run() };
        let ctx = REENTRANT.with(Cell::get);
        unsafe { __barert_check_static_ctor(ctx) };
    }

    #[test]
    fn test_constructor_runs_once() {
        RUNS.with(|runs| runs.set(0));
        let mut ctx = StaticClassConstructionContext::new(count_run);
        assert_eq!(unsafe { state(&ctx) }, InitState::Pending);
        for _ in 0..3 {
            unsafe { __barert_check_static_ctor(&mut ctx) };
        }
        assert_eq!(RUNS.with(Cell::get), 1);
        assert_eq!(unsafe { state(&ctx) }, InitState::Initialized);
    }

    #[test]
    fn test_recursive_touch_returns_immediately() {
        RUNS.with(|runs| runs.set(0));
        let mut ctx = StaticClassConstructionContext::new(touch_self);
        let raw: *mut StaticClassConstructionContext = &mut ctx;
        REENTRANT.with(|cell| cell.set(raw));
        unsafe { __barert_check_static_ctor(raw) };
        assert_eq!(RUNS.with(Cell::get), 1);
    }

    #[test]
    fn test_missing_initializer_still_marks_initialized() {
        let mut ctx = StaticClassConstructionContext {
            initializer: None,
            initialized: 0,
        };
        unsafe { ensure_initialized(&mut ctx) };
        assert_eq!(unsafe { state(&ctx) }, InitState::Initialized);
    }

    #[test]
    fn test_return_base_passes_base_through() {
        RUNS.with(|runs| runs.set(0));
        let mut ctx = StaticClassConstructionContext::new(count_run);
        let mut statics = [0u8; 16];
        let base = unsafe { __barert_check_static_ctor_return_base(&mut ctx, statics.as_mut_ptr()) };
        assert_eq!(base, statics.as_mut_ptr());
        assert_eq!(RUNS.with(Cell::get), 1);
    }
}
