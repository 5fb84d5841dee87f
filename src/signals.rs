//! Async-signal-safe delivery of SIGINT/SIGTSTP to the REPL.
//!
//! A signal handler can only safely touch a handful of primitives (no
//! allocation, no locks, no job-table mutation). So the handler here does
//! nothing but write a byte into an `AtomicU8` flag; the REPL polls the flag
//! once per loop iteration (and after every blocking wait) and does the real
//! work — `stop_current_job`/`end_current_job` against the job table — on
//! its own stack, never inside the handler itself.

#[cfg(unix)]
use std::sync::atomic::{AtomicU8, Ordering};

#[cfg(unix)]
pub const NONE: u8 = 0;
#[cfg(unix)]
pub const SIGINT_SEEN: u8 = 1;
#[cfg(unix)]
pub const SIGTSTP_SEEN: u8 = 2;

#[cfg(unix)]
static PENDING: AtomicU8 = AtomicU8::new(NONE);

#[cfg(unix)]
extern "C" fn handle_sigint(_sig: libc::c_int) {
    PENDING.store(SIGINT_SEEN, Ordering::SeqCst);
}

#[cfg(unix)]
extern "C" fn handle_sigtstp(_sig: libc::c_int) {
    PENDING.store(SIGTSTP_SEEN, Ordering::SeqCst);
}

/// Install handlers for SIGINT and SIGTSTP that defer to the flag above, and
/// ignore SIGQUIT/SIGTTOU/SIGTTIN/SIGPIPE in the shell process itself
/// (children reset all of these to `SIG_DFL` before `exec`).
#[cfg(unix)]
pub fn install() {
    unsafe {
        install_handler(libc::SIGINT, handle_sigint as usize);
        install_handler(libc::SIGTSTP, handle_sigtstp as usize);
        libc::signal(libc::SIGQUIT, libc::SIG_IGN);
        libc::signal(libc::SIGTTOU, libc::SIG_IGN);
        libc::signal(libc::SIGTTIN, libc::SIG_IGN);
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

#[cfg(unix)]
unsafe fn install_handler(signal: libc::c_int, handler: usize) {
    let mut action: libc::sigaction = std::mem::zeroed();
    action.sa_sigaction = handler;
    action.sa_flags = libc::SA_RESTART;
    unsafe {
        libc::sigemptyset(&mut action.sa_mask);
        libc::sigaction(signal, &action, std::ptr::null_mut());
    }
}

/// Reset SIGINT/SIGTSTP/SIGQUIT/SIGTTOU/SIGTTIN/SIGPIPE to their default
/// disposition. Called in the child after fork, before exec, so that
/// external programs see normal signal behavior regardless of what the
/// shell itself is doing.
#[cfg(unix)]
pub fn reset_to_default() {
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
        libc::signal(libc::SIGTSTP, libc::SIG_DFL);
        libc::signal(libc::SIGQUIT, libc::SIG_DFL);
        libc::signal(libc::SIGTTOU, libc::SIG_DFL);
        libc::signal(libc::SIGTTIN, libc::SIG_DFL);
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

/// Take and clear whatever signal was last observed, if any.
#[cfg(unix)]
pub fn take_pending() -> u8 {
    PENDING.swap(NONE, Ordering::SeqCst)
}

#[cfg(not(unix))]
pub fn install() {}
#[cfg(not(unix))]
pub fn reset_to_default() {}
#[cfg(not(unix))]
pub fn take_pending() -> u8 {
    0
}
#[cfg(not(unix))]
pub const SIGINT_SEEN: u8 = 1;
#[cfg(not(unix))]
pub const SIGTSTP_SEEN: u8 = 2;
