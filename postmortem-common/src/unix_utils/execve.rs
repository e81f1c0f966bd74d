// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use libc::c_char;
use nix::errno::Errno;
use std::ffi::CStr;

/// Replaces the process image with `path`, passing `argv` and the current environment.
///
/// Only returns on failure, with the reason. On Linux the system call is made directly so that
/// nothing in libc runs between a raw fork and the exec.
///
/// # Safety
/// `argv` must point to a null-terminated array of valid C strings that outlives the call.
pub unsafe fn raw_execv(path: &CStr, argv: *const *const c_char) -> Errno {
    #[cfg(target_os = "linux")]
    {
        libc::syscall(
            libc::SYS_execve,
            path.as_ptr(),
            argv,
            super::environ::environ(),
        );
    }
    #[cfg(not(target_os = "linux"))]
    {
        libc::execv(path.as_ptr(), argv);
    }
    Errno::last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn missing_binary_reports_enoent() {
        let path = c"/definitely/not/a/real/binary";
        let argv = [path.as_ptr(), ptr::null()];
        // Safety: argv is null terminated and outlives the call; the exec cannot succeed.
        let err = unsafe { raw_execv(path, argv.as_ptr()) };
        assert_eq!(err, Errno::ENOENT);
    }

    #[test]
    fn directories_are_not_executable() {
        let path = c"/";
        let argv = [path.as_ptr(), ptr::null()];
        // Safety: as above.
        let err = unsafe { raw_execv(path, argv.as_ptr()) };
        assert_eq!(err, Errno::EACCES);
    }
}
