//! Hosted POSIX backend: libc memory, `dlopen`, an ANSI terminal on the
//! standard streams, and a pthread monitor for sleeping.

use core::ffi::{CStr, c_char, c_int, c_void};
use core::ptr::{self, NonNull};

use crate::array::ArrayRef;
use crate::cell::RacyCell;
use crate::console::ansi::{AnsiConsole, TerminalIo};
use crate::fail::{FailFastReason, MessageBuf};
use crate::heap::HostAllocator;
use crate::interop::SymbolLoader;
use crate::startup::string_array;
use crate::string::StringRef;

pub type PlatformHeap = CallocHeap;
pub type PlatformLoader = DlLoader;
pub type PlatformConsole = AnsiConsole<StdioTerminal>;

// =============================================================================
// Memory and dynamic linking
// =============================================================================

pub struct CallocHeap;

impl HostAllocator for CallocHeap {
    fn allocate_zeroed(&self, size: usize) -> Option<NonNull<u8>> {
        // SAFETY: calloc has no preconditions.
        NonNull::new(unsafe { libc::calloc(1, size) }.cast())
    }
}

pub fn heap() -> &'static CallocHeap {
    &CallocHeap
}

pub struct DlLoader;

impl SymbolLoader for DlLoader {
    fn load_module(&self, name: &CStr) -> Option<NonNull<c_void>> {
        NonNull::new(unsafe { libc::dlopen(name.as_ptr(), libc::RTLD_LAZY) })
    }

    fn resolve_symbol(&self, module: NonNull<c_void>, name: &CStr) -> Option<NonNull<c_void>> {
        NonNull::new(unsafe { libc::dlsym(module.as_ptr(), name.as_ptr()) })
    }
}

pub fn symbol_loader() -> &'static DlLoader {
    &DlLoader
}

// =============================================================================
// Terminal
// =============================================================================

const STDIN: c_int = 0;
const STDOUT: c_int = 1;
const STDERR: c_int = 2;

/// Terminal mode at the time raw input was first enabled.
static SAVED_MODE: RacyCell<Option<libc::termios>> = RacyCell::new(None);

extern "C" fn restore_terminal() {
    // SAFETY: runs at exit, after all other runtime calls.
    if let Some(mode) = unsafe { SAVED_MODE.get_mut() }.take() {
        unsafe { libc::tcsetattr(STDIN, libc::TCSANOW, &mode) };
    }
}

/// Standard streams. Input switches the terminal to non-canonical,
/// non-echoing mode on first use and restores it at exit.
pub struct StdioTerminal {
    raw_input: bool,
}

impl StdioTerminal {
    pub const fn new() -> Self {
        Self { raw_input: false }
    }

    fn ensure_raw_input(&mut self) {
        if self.raw_input {
            return;
        }
        self.raw_input = true;

        // SAFETY: termios is plain data; tcgetattr fills it.
        let mut mode: libc::termios = unsafe { core::mem::zeroed() };
        if unsafe { libc::tcgetattr(STDIN, &mut mode) } != 0 {
            // Not a terminal (pipe or file): read it as is.
            return;
        }
        SAVED_MODE.set(Some(mode));
        unsafe { libc::atexit(restore_terminal) };

        mode.c_lflag &= !(libc::ICANON | libc::ECHO);
        mode.c_cc[libc::VMIN] = 1;
        mode.c_cc[libc::VTIME] = 0;
        unsafe { libc::tcsetattr(STDIN, libc::TCSANOW, &mode) };
    }
}

impl Default for StdioTerminal {
    fn default() -> Self {
        Self::new()
    }
}

fn write_all(fd: c_int, mut bytes: &[u8]) {
    while !bytes.is_empty() {
        let written = unsafe { libc::write(fd, bytes.as_ptr().cast(), bytes.len()) };
        if written <= 0 {
            return;
        }
        bytes = &bytes[written as usize..];
    }
}

impl TerminalIo for StdioTerminal {
    fn write_bytes(&mut self, bytes: &[u8]) {
        write_all(STDOUT, bytes);
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> isize {
        self.ensure_raw_input();
        unsafe { libc::read(STDIN, buffer.as_mut_ptr().cast(), buffer.len()) }
    }

    fn input_ready(&mut self) -> bool {
        self.ensure_raw_input();
        let mut poll = libc::pollfd {
            fd: STDIN,
            events: libc::POLLIN,
            revents: 0,
        };
        unsafe { libc::poll(&mut poll, 1, 0) > 0 && poll.revents & libc::POLLIN != 0 }
    }
}

static CONSOLE: RacyCell<PlatformConsole> = RacyCell::new(AnsiConsole::new(StdioTerminal::new()));

pub unsafe fn console() -> &'static mut PlatformConsole {
    unsafe { CONSOLE.get_mut() }
}

// =============================================================================
// Time
// =============================================================================

fn clock_now(clock: libc::clockid_t) -> libc::timespec {
    // SAFETY: timespec is plain data; clock_gettime fills it.
    let mut now: libc::timespec = unsafe { core::mem::zeroed() };
    unsafe { libc::clock_gettime(clock, &mut now) };
    now
}

fn is_before(a: &libc::timespec, b: &libc::timespec) -> bool {
    (a.tv_sec, a.tv_nsec) < (b.tv_sec, b.tv_nsec)
}

/// Clock shared by the sleep deadline and the monitor's condition variable.
#[cfg(not(target_vendor = "apple"))]
const SLEEP_CLOCK: libc::clockid_t = libc::CLOCK_MONOTONIC;
// Apple condition variables only time out against the wall clock.
#[cfg(target_vendor = "apple")]
const SLEEP_CLOCK: libc::clockid_t = libc::CLOCK_REALTIME;

struct Monitor {
    mutex: libc::pthread_mutex_t,
    condition: libc::pthread_cond_t,
    /// Set once `condition` has been bound to [`SLEEP_CLOCK`]. Guarded by `mutex`.
    clock_bound: bool,
}

/// Never signaled: waiting on it is a sleep that cannot be cut short.
static SLEEP_MONITOR: RacyCell<Monitor> = RacyCell::new(Monitor {
    mutex: libc::PTHREAD_MUTEX_INITIALIZER,
    condition: libc::PTHREAD_COND_INITIALIZER,
    clock_bound: false,
});

/// Re-initialize `condition` so its timed waits measure [`SLEEP_CLOCK`].
///
/// # Safety
///
/// The caller holds the monitor mutex and nobody is waiting on `condition`.
unsafe fn bind_sleep_clock(monitor: *mut Monitor) {
    unsafe {
        if (*monitor).clock_bound {
            return;
        }
        #[cfg(not(target_vendor = "apple"))]
        {
            let mut attributes: libc::pthread_condattr_t = core::mem::zeroed();
            libc::pthread_condattr_init(&mut attributes);
            libc::pthread_condattr_setclock(&mut attributes, SLEEP_CLOCK);
            libc::pthread_cond_destroy(&raw mut (*monitor).condition);
            libc::pthread_cond_init(&raw mut (*monitor).condition, &attributes);
            libc::pthread_condattr_destroy(&mut attributes);
        }
        (*monitor).clock_bound = true;
    }
}

pub fn sleep(milliseconds: u32) {
    let mut deadline = clock_now(SLEEP_CLOCK);
    deadline.tv_sec += (milliseconds / 1000) as libc::time_t;
    deadline.tv_nsec += ((milliseconds % 1000) * 1_000_000) as libc::c_long;
    if deadline.tv_nsec >= 1_000_000_000 {
        deadline.tv_sec += 1;
        deadline.tv_nsec -= 1_000_000_000;
    }

    let monitor = SLEEP_MONITOR.as_ptr();
    // SAFETY: every field of the monitor is only touched with its mutex held.
    unsafe {
        let mutex = &raw mut (*monitor).mutex;
        let condition = &raw mut (*monitor).condition;
        libc::pthread_mutex_lock(mutex);
        bind_sleep_clock(monitor);
        while is_before(&clock_now(SLEEP_CLOCK), &deadline) {
            libc::pthread_cond_timedwait(condition, mutex, &deadline);
        }
        libc::pthread_mutex_unlock(mutex);
    }
}

pub fn tick_count64() -> i64 {
    let now = clock_now(libc::CLOCK_MONOTONIC);
    now.tv_sec as i64 * 1000 + now.tv_nsec as i64 / 1_000_000
}

// =============================================================================
// Process
// =============================================================================

#[cfg_attr(not(panic = "abort"), allow(dead_code))]
pub(crate) fn fail_fast(reason: FailFastReason) -> ! {
    write_all(STDERR, MessageBuf::for_reason(reason).as_bytes());
    unsafe { libc::abort() }
}

static COMMAND_LINE: RacyCell<(c_int, *const *const c_char)> = RacyCell::new((0, ptr::null()));

pub unsafe fn store_command_line(argc: i32, argv: *const *const c_char) {
    COMMAND_LINE.set((argc, argv));
}

pub fn main_arguments() -> ArrayRef {
    let (argc, argv) = COMMAND_LINE.get();
    let count = if argv.is_null() { 0 } else { (argc - 1).max(0) as usize };
    string_array(
        heap(),
        (1..count + 1).map(|i| {
            // SAFETY: the stored vector holds `argc` valid C strings.
            unsafe { StringRef::from_narrow_cstr(heap(), *argv.add(i)) }
        }),
    )
}

#[cfg(all(not(test), panic = "abort"))]
#[unsafe(no_mangle)]
pub extern "C" fn main(argc: c_int, argv: *const *const c_char) -> c_int {
    unsafe {
        store_command_line(argc, argv);
        crate::startup::__barert_managed_main(argc, argv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_ticks_do_not_go_backwards() {
        let first = tick_count64();
        let second = tick_count64();
        assert!(second >= first);
    }

    #[test]
    fn test_sleep_runs_to_deadline() {
        let start = tick_count64();
        sleep(20);
        assert!(tick_count64() - start >= 19);
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    #[test]
    fn test_sleep_deadline_uses_monotonic_clock() {
        assert_eq!(SLEEP_CLOCK, libc::CLOCK_MONOTONIC);
        for _ in 0..2 {
            let start = tick_count64();
            sleep(15);
            assert!(tick_count64() - start >= 14);
        }
        let monitor = SLEEP_MONITOR.as_ptr();
        unsafe {
            libc::pthread_mutex_lock(&raw mut (*monitor).mutex);
            assert!((*monitor).clock_bound);
            libc::pthread_mutex_unlock(&raw mut (*monitor).mutex);
        }
    }

    #[test]
    fn test_sleep_zero_returns() {
        sleep(0);
    }

    #[test]
    fn test_calloc_heap_is_zeroed() {
        let memory = CallocHeap.allocate_zeroed(64).unwrap();
        let bytes = unsafe { core::slice::from_raw_parts(memory.as_ptr(), 64) };
        assert!(bytes.iter().all(|&b| b == 0));
    }
}
