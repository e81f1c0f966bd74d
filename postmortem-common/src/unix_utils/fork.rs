// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io::{self, Read};

/// Forks without running `pthread_atfork` handlers, which may take locks held by the thread
/// that crashed.
///
/// Returns the child's pid in the parent, 0 in the child and a negative value on failure, with
/// `errno` set. The child must only make async-signal-safe calls before exec or `_exit`.
#[cfg(target_os = "linux")]
pub fn alt_fork() -> libc::pid_t {
    use libc::{
        c_ulong, c_void, pid_t, syscall, SYS_clone, CLONE_CHILD_CLEARTID, CLONE_CHILD_SETTID,
        CLONE_PTRACE, SIGCHLD,
    };

    let mut parent_tid: pid_t = 0;
    let mut child_tid: pid_t = 0;

    // A traced parent keeps the debugger attached to the helper as well.
    let trace_flag = if is_being_traced().unwrap_or(false) {
        CLONE_PTRACE
    } else {
        0
    };

    // Same flags as glibc's fork(), minus the atfork handlers.
    // Safety: the child never returns into code that assumes a separate address space setup.
    let res = unsafe {
        syscall(
            SYS_clone,
            (CLONE_CHILD_CLEARTID | CLONE_CHILD_SETTID | SIGCHLD | trace_flag) as c_ulong,
            std::ptr::null_mut::<c_void>(),
            &mut parent_tid as *mut pid_t,
            &mut child_tid as *mut pid_t,
            0 as c_ulong,
        )
    };
    res.clamp(pid_t::MIN as libc::c_long, pid_t::MAX as libc::c_long) as pid_t
}

#[cfg(not(target_os = "linux"))]
pub fn alt_fork() -> libc::pid_t {
    // macOS has a lower level `__fork()`, but the child of it may not even call malloc, which
    // buys nothing over living with the atfork handlers.
    // Safety: no preconditions.
    unsafe { libc::fork() }
}

/// Whether a debugger (or any other tracer) is attached to this process.
///
/// Does not allocate. A failure to inspect the process can be treated as "not traced".
#[cfg(target_os = "linux")]
pub fn is_being_traced() -> io::Result<bool> {
    let status = std::fs::File::open("/proc/self/status")?;
    Ok(tracer_pid(status)?.is_some_and(|pid| pid != 0))
}

#[cfg(target_os = "macos")]
pub fn is_being_traced() -> io::Result<bool> {
    // From <sys/proc.h>.
    const P_TRACED: libc::c_int = 0x0000_0800;

    // Safety: `kinfo_proc` is plain old data.
    let mut info: libc::kinfo_proc = unsafe { std::mem::zeroed() };
    let mut size = std::mem::size_of::<libc::kinfo_proc>();
    // Safety: no preconditions.
    let pid = unsafe { libc::getpid() };
    let mut mib = [libc::CTL_KERN, libc::KERN_PROC, libc::KERN_PROC_PID, pid];
    // Safety: every pointer is valid for the sizes passed alongside it.
    let rc = unsafe {
        libc::sysctl(
            mib.as_mut_ptr(),
            mib.len() as libc::c_uint,
            &mut info as *mut libc::kinfo_proc as *mut libc::c_void,
            &mut size,
            std::ptr::null_mut(),
            0,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(info.kp_proc.p_flag & P_TRACED != 0)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn is_being_traced() -> io::Result<bool> {
    Ok(false)
}

const TRACER_PID_MARKER: &[u8] = b"TracerPid:";
/// Only the start of each line matters; the remainder is dropped.
const LINE_PREFIX_LEN: usize = 64;

/// Finds the `TracerPid:` entry of a `/proc/<pid>/status` style stream.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn tracer_pid<R: Read>(mut reader: R) -> io::Result<Option<u32>> {
    let mut chunk = [0u8; 512];
    let mut line = [0u8; LINE_PREFIX_LEN];
    let mut line_len = 0;

    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        for &byte in &chunk[..read] {
            if byte == b'\n' {
                if let Some(pid) = parse_tracer_line(&line[..line_len]) {
                    return Ok(Some(pid));
                }
                line_len = 0;
            } else if line_len < LINE_PREFIX_LEN {
                line[line_len] = byte;
                line_len += 1;
            }
        }
    }
    Ok(parse_tracer_line(&line[..line_len]))
}

fn parse_tracer_line(line: &[u8]) -> Option<u32> {
    let value = line.strip_prefix(TRACER_PID_MARKER)?;
    let mut digits = value
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .peekable();
    digits.peek()?;
    digits.try_fold(0u32, |pid, digit| {
        pid.checked_mul(10)?.checked_add(u32::from(digit - b'0'))
    })
}
