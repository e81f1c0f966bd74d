// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::shared::constants::{PATH_CAPACITY, STACK_TRACE_FILE_PREFIX};
use crate::signal_safe::{write_fd, FixedCString};
use nix::errno::Errno;
use std::ffi::CStr;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

const REPORT_FILE_FLAGS: libc::c_int =
    libc::O_CREAT | libc::O_WRONLY | libc::O_TRUNC | libc::O_EXCL | libc::O_CLOEXEC;
const REPORT_FILE_MODE: libc::c_uint = 0o640;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LogFileError {
    #[error("report file name does not fit in {PATH_CAPACITY} bytes")]
    NameTooLong,
    #[error("unable to create the report file: {0}")]
    Create(Errno),
}

/// A freshly created report file, open for writing.
#[derive(Debug)]
pub struct LogFile {
    path: FixedCString<PATH_CAPACITY>,
    fd: OwnedFd,
}

impl LogFile {
    pub fn path(&self) -> &CStr {
        self.path.as_cstr()
    }

    pub fn fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    pub fn write(&self, bytes: &[u8]) {
        write_fd(self.fd(), bytes);
    }
}

/// Creates `<dir>/st_<program>.<pid>`, or the first free `<dir>/st_<program>.<pid>.<n>`.
///
/// Creation is exclusive, so two reports never share a file. Async-signal-safe.
pub fn create_unique_log_file(
    dir: &CStr,
    program: &CStr,
    pid: libc::pid_t,
) -> Result<LogFile, LogFileError> {
    let mut path = FixedCString::<PATH_CAPACITY>::new();
    path.push_cstr(dir)
        .push_bytes(b"/")
        .push_str(STACK_TRACE_FILE_PREFIX)
        .push_bytes(b"_")
        .push_cstr(program)
        .push_bytes(b".")
        .push_decimal(i64::from(pid));
    if path.is_truncated() {
        return Err(LogFileError::NameTooLong);
    }
    let base_len = path.len();

    let mut suffix: i64 = 0;
    loop {
        // Safety: the path is NUL-terminated and outlives the call.
        let fd = unsafe { libc::open(path.as_ptr(), REPORT_FILE_FLAGS, REPORT_FILE_MODE) };
        if fd >= 0 {
            // Safety: `open` just returned this descriptor and nothing else owns it.
            let fd = unsafe { OwnedFd::from_raw_fd(fd) };
            return Ok(LogFile { path, fd });
        }
        match Errno::last() {
            Errno::EEXIST => {}
            Errno::EINTR => continue,
            err => return Err(LogFileError::Create(err)),
        }
        suffix += 1;
        path.truncate(base_len);
        path.push_bytes(b".").push_decimal(suffix);
        if path.is_truncated() {
            return Err(LogFileError::NameTooLong);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::fs::PermissionsExt;

    fn dir_cstring(dir: &tempfile::TempDir) -> CString {
        CString::new(dir.path().as_os_str().as_bytes()).unwrap()
    }

    #[test]
    fn collisions_get_a_numeric_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let dir_c = dir_cstring(&dir);

        let first = create_unique_log_file(&dir_c, c"tool", 4242).unwrap();
        let second = create_unique_log_file(&dir_c, c"tool", 4242).unwrap();
        let third = create_unique_log_file(&dir_c, c"tool", 4242).unwrap();

        let expected = dir.path().join("st_tool.4242");
        assert_eq!(first.path().to_bytes(), expected.as_os_str().as_bytes());
        assert_eq!(
            second.path().to_bytes(),
            dir.path().join("st_tool.4242.1").as_os_str().as_bytes()
        );
        assert_eq!(
            third.path().to_bytes(),
            dir.path().join("st_tool.4242.2").as_os_str().as_bytes()
        );

        first.write(b"first\n");
        assert_eq!(std::fs::read_to_string(&expected).unwrap(), "first\n");
    }

    #[test]
    fn concurrent_creators_never_share_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let dir_c = dir_cstring(&dir);
        let paths: Vec<Vec<u8>> = std::thread::scope(|scope| {
            let creators: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        let file = create_unique_log_file(&dir_c, c"tool", 7).unwrap();
                        file.write(b"mine\n");
                        file.path().to_bytes().to_vec()
                    })
                })
                .collect();
            creators.into_iter().map(|c| c.join().unwrap()).collect()
        });
        let mut unique = paths.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 8);
        for path in paths {
            let path = std::path::Path::new(std::ffi::OsStr::from_bytes(&path));
            assert_eq!(std::fs::read_to_string(path).unwrap(), "mine\n");
        }
    }

    #[test]
    fn files_are_not_world_readable() {
        let dir = tempfile::tempdir().unwrap();
        let file = create_unique_log_file(&dir_cstring(&dir), c"tool", 1).unwrap();
        let mode = std::fs::metadata(dir.path().join("st_tool.1"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & !REPORT_FILE_MODE & 0o777, 0);
        drop(file);
    }

    #[test]
    fn missing_directories_are_reported() {
        let err = create_unique_log_file(c"/nonexistent/postmortem", c"tool", 1).unwrap_err();
        assert_eq!(err, LogFileError::Create(Errno::ENOENT));
    }

    #[test]
    fn overlong_names_are_refused() {
        let long = CString::new(vec![b'd'; PATH_CAPACITY]).unwrap();
        assert_eq!(
            create_unique_log_file(&long, c"tool", 1).unwrap_err(),
            LogFileError::NameTooLong
        );
    }
}
