// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::shared::constants::UNKNOWN_SYMBOL;
use blazesym::symbolize::source::{Process, Source};
use blazesym::symbolize::{Input, Symbolized, Symbolizer};
use postmortem_common::RwLockExt;
use std::ffi::CStr;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use symbolic_common::Name;
use symbolic_demangle::{Demangle, DemangleOptions};
use tracing::debug;

/// Where an address lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressInfo {
    pub module_path: Option<PathBuf>,
    /// Load address of the module, 0 when unknown.
    pub module_base: usize,
    pub symbol_name: String,
    pub symbol_address: usize,
}

/// Turns a return address into the text shown for its frame.
pub type StackTraceCallback = Arc<dyn Fn(usize) -> String + Send + Sync>;

static STACK_TRACE_CALLBACK: RwLock<Option<StackTraceCallback>> = RwLock::new(None);

thread_local! {
    static SYMBOLIZER: Symbolizer = Symbolizer::new();
}

struct LoadedModule {
    path: Option<PathBuf>,
    base: usize,
    symbol: Option<(String, usize)>,
}

fn dladdr_lookup(address: usize) -> Option<LoadedModule> {
    // Safety: `Dl_info` is plain old data.
    let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
    // Safety: dladdr accepts any address and only writes to `info`.
    if unsafe { libc::dladdr(address as *const libc::c_void, &mut info) } == 0 {
        return None;
    }
    let path = (!info.dli_fname.is_null()).then(|| {
        // Safety: the loader hands out NUL-terminated names.
        PathBuf::from(std::ffi::OsStr::from_bytes(
            unsafe { CStr::from_ptr(info.dli_fname) }.to_bytes(),
        ))
    });
    let symbol = (!info.dli_sname.is_null() && !info.dli_saddr.is_null()).then(|| {
        // Safety: as above.
        let name = unsafe { CStr::from_ptr(info.dli_sname) };
        (
            name.to_string_lossy().into_owned(),
            info.dli_saddr as usize,
        )
    });
    Some(LoadedModule {
        path,
        base: info.dli_fbase as usize,
        symbol,
    })
}

fn blazesym_lookup(address: usize) -> Option<(String, usize, Option<PathBuf>)> {
    let mut process = Process::new(std::process::id().into());
    process.map_files = false;
    let src = Source::Process(process);
    SYMBOLIZER.with(
        |symbolizer| match symbolizer.symbolize_single(&src, Input::AbsAddr(address as u64)) {
            Ok(Symbolized::Sym(sym)) => Some((
                sym.name.into_owned(),
                sym.addr as usize,
                sym.module.map(|module| PathBuf::from(module.into_owned())),
            )),
            Ok(Symbolized::Unknown(reason)) => {
                debug!(address, %reason, "Address did not symbolize");
                None
            }
            Err(err) => {
                debug!(address, %err, "Symbolization failed");
                None
            }
        },
    )
}

/// Resolves the module and symbol containing `address`.
///
/// `None` unless a symbol is found. Allocates, so never call this on the crash path.
pub fn resolve(address: usize) -> Option<AddressInfo> {
    let loaded = dladdr_lookup(address);
    let (symbol_name, symbol_address, symbol_module) = blazesym_lookup(address).or_else(|| {
        let (name, addr) = loaded.as_ref()?.symbol.clone()?;
        Some((name, addr, None))
    })?;
    if symbol_address == 0 {
        return None;
    }
    let (module_path, module_base) = match loaded {
        Some(module) => (module.path.or(symbol_module), module.base),
        None => (symbol_module, 0),
    };
    Some(AddressInfo {
        module_path,
        module_base,
        symbol_name,
        symbol_address,
    })
}

/// Demangles Rust, Itanium C++ and MSVC names. Anything else is returned unchanged.
pub fn demangle(name: &str) -> String {
    match Name::from(name).demangle(DemangleOptions::name_only()) {
        Some(demangled) if !demangled.is_empty() => demangled,
        _ => name.to_string(),
    }
}

/// `<demangled symbol>+<offset>` for a return address, or `<unknown>`.
///
/// Return addresses point past the call, so the lookup uses the byte before.
pub fn default_symbolic_name(address: usize) -> String {
    match resolve(address.wrapping_sub(1)) {
        Some(info) => format!(
            "{}+{:#x}",
            demangle(&info.symbol_name),
            address.wrapping_sub(info.symbol_address)
        ),
        None => UNKNOWN_SYMBOL.to_string(),
    }
}

/// Replaces the way frames are named. `None` restores [`default_symbolic_name`].
pub fn set_stack_trace_callback(callback: Option<StackTraceCallback>) {
    *STACK_TRACE_CALLBACK.write_or_recover() = callback;
}

pub fn stack_trace_callback() -> Option<StackTraceCallback> {
    STACK_TRACE_CALLBACK.read_or_recover().clone()
}

/// The installed callback's name for `address`, or the default one.
pub fn symbolic_name(address: usize) -> String {
    match stack_trace_callback() {
        Some(callback) => callback(address),
        None => default_symbolic_name(address),
    }
}
