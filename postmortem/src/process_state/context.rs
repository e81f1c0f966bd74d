// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::shared::configuration::DiagnosticsConfiguration;
use crate::shared::constants::{DEFAULT_PROGRAM_NAME, HOST_NAME_CAPACITY};
use crate::signal_safe::FixedCString;
use libc::c_char;
use postmortem_common::unix_utils::is_being_traced;
use std::ffi::{CStr, CString};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicPtr};
use tracing::{debug, info};

static APP_LAUNCH_TIME: AtomicI64 = AtomicI64::new(0);
static PROGRAM_NAME: AtomicPtr<c_char> = AtomicPtr::new(ptr::null_mut());
static IS_CRASHING: AtomicBool = AtomicBool::new(false);
static FATAL_STACK_LOGGING: AtomicBool = AtomicBool::new(false);
static CONFIG: AtomicPtr<InstalledConfig> = AtomicPtr::new(ptr::null_mut());

/// A configuration together with the C strings the crash path needs from it.
#[derive(Debug)]
pub struct InstalledConfig {
    config: DiagnosticsConfiguration,
    report_dir: CString,
    postmortem_env_var: CString,
    session_env_var: CString,
}

impl InstalledConfig {
    fn new(config: DiagnosticsConfiguration) -> anyhow::Result<Self> {
        Ok(Self {
            report_dir: CString::new(config.report_dir().as_os_str().as_bytes())?,
            postmortem_env_var: CString::new(config.postmortem_env_var())?,
            session_env_var: CString::new(config.session_env_var())?,
            config,
        })
    }

    fn fallback() -> Self {
        Self::new(DiagnosticsConfiguration::default()).unwrap_or_else(|_| Self {
            config: DiagnosticsConfiguration::default(),
            report_dir: c"/tmp".to_owned(),
            postmortem_env_var: c"PM_POSTMORTEM".to_owned(),
            session_env_var: c"PM_LOGSESSION".to_owned(),
        })
    }

    pub fn config(&self) -> &DiagnosticsConfiguration {
        &self.config
    }

    pub fn report_dir(&self) -> &CStr {
        &self.report_dir
    }

    pub fn postmortem_env_var(&self) -> &CStr {
        &self.postmortem_env_var
    }

    pub fn session_env_var(&self) -> &CStr {
        &self.session_env_var
    }
}

/// Installs `config` for every later report.
///
/// A report running concurrently may still read the previous configuration, so it is never
/// freed.
pub fn update_config(config: DiagnosticsConfiguration) -> anyhow::Result<()> {
    let installed = Box::into_raw(Box::new(InstalledConfig::new(config)?));
    CONFIG.swap(installed, SeqCst);
    Ok(())
}

/// The installed configuration; the defaults when nothing was installed yet.
pub fn installed_config() -> &'static InstalledConfig {
    let current = CONFIG.load(SeqCst);
    if !current.is_null() {
        // Safety: installed configurations are leaked, so the pointer stays valid.
        return unsafe { &*current };
    }
    let fallback = Box::into_raw(Box::new(InstalledConfig::fallback()));
    match CONFIG.compare_exchange(ptr::null_mut(), fallback, SeqCst, SeqCst) {
        // Safety: as above.
        Ok(_) => unsafe { &*fallback },
        Err(winner) => {
            // Safety: `fallback` was never published.
            drop(unsafe { Box::from_raw(fallback) });
            // Safety: as above.
            unsafe { &*winner }
        }
    }
}

/// Prepares the process for crash reporting.
///
/// Records the launch time, installs `config`, takes the program name from `argv[0]` unless
/// one was set, and calibrates the tick counter so that the crash path never has to.
pub fn init(config: DiagnosticsConfiguration) -> anyhow::Result<()> {
    let launch_time = app_launch_time();
    update_config(config)?;
    if PROGRAM_NAME.load(SeqCst).is_null() {
        if let Some(arg0) = std::env::args_os().next() {
            set_program_name_for_errors(Some(&arg0.to_string_lossy()));
        }
    }
    let calibration = postmortem_common::timing::calibration();
    debug!(
        launch_time,
        program = %program_name_for_errors().to_string_lossy(),
        nanoseconds_per_tick = calibration.nanoseconds_per_tick(),
        "Crash diagnostics initialized"
    );
    if is_being_traced().unwrap_or(false) {
        info!("A debugger is attached, fatal reports will stop in it");
    }
    Ok(())
}

fn now_seconds() -> i64 {
    // Safety: a null argument is allowed.
    unsafe { libc::time(ptr::null_mut()) as i64 }
}

/// Seconds since the epoch at which the process started, recorded on first use.
pub fn app_launch_time() -> i64 {
    let recorded = APP_LAUNCH_TIME.load(SeqCst);
    if recorded != 0 {
        return recorded;
    }
    let now = now_seconds();
    match APP_LAUNCH_TIME.compare_exchange(0, now, SeqCst, SeqCst) {
        Ok(_) => now,
        Err(recorded) => recorded,
    }
}

/// User CPU seconds consumed so far, or wall seconds since launch if that is unavailable.
/// Async-signal-safe.
pub fn app_elapsed_seconds() -> i64 {
    // Safety: `rusage` is plain old data.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    // Safety: `usage` is a valid out pointer.
    if unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) } == 0 {
        usage.ru_utime.tv_sec as i64
    } else {
        now_seconds() - app_launch_time()
    }
}

/// Sets the name reports use for the program. Only the last path component is kept; `None`
/// restores the default.
pub fn set_program_name_for_errors(name: Option<&str>) {
    let Some(name) = name else {
        PROGRAM_NAME.store(ptr::null_mut(), SeqCst);
        return;
    };
    let base = Path::new(name)
        .file_name()
        .map(|base| base.as_bytes())
        .unwrap_or(name.as_bytes());
    let base = base.split(|&b| b == 0).next().unwrap_or_default();
    let Ok(owned) = CString::new(base) else {
        return;
    };
    if owned.is_empty() {
        return;
    }
    let leaked: &'static CStr = Box::leak(owned.into_boxed_c_str());
    // Readers on the crash path may still hold the previous name, so it is leaked too.
    PROGRAM_NAME.store(leaked.as_ptr() as *mut c_char, SeqCst);
}

/// The program name for reports. Async-signal-safe.
pub fn program_name_for_errors() -> &'static CStr {
    let name = PROGRAM_NAME.load(SeqCst);
    if name.is_null() {
        DEFAULT_PROGRAM_NAME
    } else {
        // Safety: stored names are leaked NUL-terminated strings.
        unsafe { CStr::from_ptr(name) }
    }
}

/// Set once a fatal report starts and never cleared.
pub fn is_app_crashing() -> bool {
    IS_CRASHING.load(SeqCst)
}

pub(crate) fn set_app_is_crashing() {
    IS_CRASHING.store(true, SeqCst);
}

/// Whether fatal reports also run the session logger.
pub fn fatal_stack_logging() -> bool {
    FATAL_STACK_LOGGING.load(SeqCst)
}

pub fn set_fatal_stack_logging(enabled: bool) {
    FATAL_STACK_LOGGING.store(enabled, SeqCst);
}

/// This machine's name, `localhost` when it cannot be determined. Async-signal-safe.
pub fn hostname() -> FixedCString<HOST_NAME_CAPACITY> {
    let mut raw = [0u8; HOST_NAME_CAPACITY];
    let mut name = FixedCString::new();
    // Safety: the length leaves room for a terminator gethostname may not write.
    if unsafe { libc::gethostname(raw.as_mut_ptr().cast(), raw.len() - 1) } == 0 {
        let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len() - 1);
        name.push_bytes(&raw[..len]);
    }
    if name.is_empty() {
        name.push_bytes(b"localhost");
    }
    name
}
