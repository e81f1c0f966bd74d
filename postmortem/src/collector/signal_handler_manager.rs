// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::signal_from_signum;
use crate::report::log_fatal_process_state;
use crate::shared::configuration::CrashHandlerConfiguration;
use crate::signal_safe::{write_fd, FixedCString};
use libc::{
    c_void, mmap, sigaltstack, siginfo_t, MAP_ANON, MAP_FAILED, MAP_PRIVATE, PROT_NONE, PROT_READ,
    PROT_WRITE, SIGSTKSZ,
};
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, Signal};
use postmortem_common::unix_utils::terminate;
use std::ptr;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::SeqCst;
use tracing::debug;

// Linux has the most, up to 64 inclusive.
const MAX_SIGNALS: usize = 65;
static mut HANDLERS: [Option<(Signal, SigAction)>; MAX_SIGNALS] = [None; MAX_SIGNALS];
static INIT_STARTED: AtomicBool = AtomicBool::new(false);
static INIT_FINISHED: AtomicBool = AtomicBool::new(false);

/// Installs handlers that turn the configured signals into fatal reports.
///
/// After the report, the previous disposition of the signal takes over, so a default action
/// still terminates the process (and dumps core where enabled). Registration happens once per
/// process; a second call is an error.
///
/// If the process crashes while this runs, the previous handlers may not be recorded yet and
/// the process exits without chaining.
pub fn register_crash_handlers(config: &CrashHandlerConfiguration) -> anyhow::Result<()> {
    anyhow::ensure!(
        INIT_STARTED
            .compare_exchange(false, true, SeqCst, SeqCst)
            .is_ok(),
        "Attempted to double register crash handlers"
    );

    for signum in config.signals() {
        anyhow::ensure!(*signum > 0 && *signum < MAX_SIGNALS as i32);
    }

    if config.create_alt_stack() {
        // Safety: no preconditions.
        unsafe { create_alt_stack()? };
    }

    let mut errors = vec![];
    for signum in config.signals() {
        let index = *signum as usize;
        // Safety: no preconditions.
        match unsafe { register_signal_handler(*signum, config.use_alt_stack()) } {
            // Safety: `INIT_STARTED` keeps every other registration out, and the handler does
            // not read `HANDLERS` until `INIT_FINISHED` is set below.
            Ok(handler) => unsafe { HANDLERS[index] = Some(handler) },
            Err(e) => errors.push(format!("Unable to register signal for {signum}: {e:?}")),
        };
    }
    INIT_FINISHED.store(true, SeqCst);
    anyhow::ensure!(
        errors.is_empty(),
        "Errors registering signal handlers {errors:?}"
    );
    debug!(signals = ?config.signals(), "Crash handlers registered");
    Ok(())
}

extern "C" fn handle_crash_signal(signum: i32, sig_info: *mut siginfo_t, ucontext: *mut c_void) {
    let mut reason = FixedCString::<64>::new();
    reason.push_bytes(b"received signal ");
    match Signal::try_from(signum) {
        Ok(signal) => reason.push_str(signal.as_str()),
        Err(_) => reason.push_decimal(i64::from(signum)),
    };
    log_fatal_process_state(Some(reason.as_cstr()), None, None);
    // Safety: only installed by `register_crash_handlers`.
    unsafe { chain_signal_handler(signum, sig_info, ucontext) };
}

/// Hands the signal to whatever was installed before us.
///
/// A default disposition is restored and the signal raised again; it is delivered once this
/// handler returns. A synchronous fault re-executes the faulting instruction in any case.
unsafe fn chain_signal_handler(signum: i32, sig_info: *mut siginfo_t, ucontext: *mut c_void) {
    if !INIT_FINISHED.load(SeqCst) {
        write_fd(
            libc::STDERR_FILENO,
            b"Crashed during signal handler setup, cannot chain, exiting\n",
        );
        terminate()
    }
    if signum <= 0 || signum >= MAX_SIGNALS as i32 {
        write_fd(libc::STDERR_FILENO, b"Unexpected signal number, cannot chain, exiting\n");
        terminate()
    }
    // Safety: `INIT_FINISHED` is set, so nothing mutates `HANDLERS` any more.
    let Some((signal, sigaction)) = (unsafe { HANDLERS[signum as usize] }) else {
        write_fd(libc::STDERR_FILENO, b"Missing chain handler, cannot chain, exiting\n");
        terminate()
    };
    match sigaction.handler() {
        SigHandler::SigDfl => {
            // Safety: restoring a disposition we saved ourselves.
            if unsafe { signal::sigaction(signal, &sigaction) }.is_err() {
                terminate()
            }
            // Safety: no preconditions.
            unsafe { libc::raise(signum) };
        }
        SigHandler::SigIgn => (),
        SigHandler::Handler(f) => f(signum),
        SigHandler::SigAction(f) => f(signum, sig_info, ucontext),
    }
}

/// Allocates an alternate signal stack with a guard page below it.
unsafe fn create_alt_stack() -> anyhow::Result<()> {
    // Symbolizing on the crash path needs far more than the default SIGSTKSZ.
    let page_size = page_size::get();
    let stack_size = std::cmp::max(SIGSTKSZ, 16 * page_size);
    let stackp = mmap(
        ptr::null_mut(),
        stack_size + page_size,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANON,
        -1,
        0,
    );
    anyhow::ensure!(
        stackp != MAP_FAILED,
        "failed to allocate an alternative stack"
    );
    let guard_result = libc::mprotect(stackp, page_size, PROT_NONE);
    anyhow::ensure!(
        guard_result == 0,
        "failed to set up alternative stack guard page"
    );
    let stackp = stackp.add(page_size);

    let stack = libc::stack_t {
        ss_sp: stackp,
        ss_flags: 0,
        ss_size: stack_size,
    };
    let rval = sigaltstack(&stack, ptr::null_mut());
    anyhow::ensure!(rval == 0, "sigaltstack failed {rval}");
    Ok(())
}

unsafe fn register_signal_handler(
    signum: i32,
    use_alt_stack: bool,
) -> anyhow::Result<(Signal, SigAction)> {
    let signal_type = signal_from_signum(signum)?;
    let flags = if use_alt_stack {
        SaFlags::SA_ONSTACK
    } else {
        SaFlags::empty()
    };
    // The signal stays blocked while the report runs, so a fault inside the report kills the
    // process instead of re-entering it.
    let sig_action = SigAction::new(
        SigHandler::SigAction(handle_crash_signal),
        flags,
        signal::SigSet::empty(),
    );
    let old_handler = signal::sigaction(signal_type, &sig_action)?;
    Ok((signal_type, old_handler))
}
