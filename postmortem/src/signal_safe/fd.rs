// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::os::fd::RawFd;

/// Writes all of `bytes` to `fd`, ignoring failures and leaving `errno` as it was.
pub fn write_fd(fd: RawFd, bytes: &[u8]) {
    let saved = errno::errno();
    let mut remaining = bytes;
    while !remaining.is_empty() {
        // Safety: the pointer and length come from a live slice.
        let rc = unsafe { libc::write(fd, remaining.as_ptr().cast(), remaining.len()) };
        if rc < 0 && errno::errno().0 == libc::EINTR {
            continue;
        }
        if rc <= 0 {
            break;
        }
        remaining = &remaining[rc as usize..];
    }
    errno::set_errno(saved);
}

/// An unbuffered [`io::Write`] over a descriptor it does not own.
///
/// Errors are OS errors, which `io::Error` stores without allocating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdWriter {
    fd: RawFd,
}

impl FdWriter {
    pub const fn new(fd: RawFd) -> Self {
        Self { fd }
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }
}

impl io::Write for FdWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            // Safety: the pointer and length come from a live slice.
            let rc = unsafe { libc::write(self.fd, buf.as_ptr().cast(), buf.len()) };
            if rc >= 0 {
                return Ok(rc as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, Write};
    use std::os::fd::AsRawFd;

    #[test]
    fn write_fd_keeps_errno() {
        let mut file = tempfile::tempfile().unwrap();
        errno::set_errno(errno::Errno(libc::ENOENT));
        write_fd(file.as_raw_fd(), b"first line\n");
        assert_eq!(errno::errno().0, libc::ENOENT);

        write_fd(-1, b"lost");
        assert_eq!(errno::errno().0, libc::ENOENT);

        file.rewind().unwrap();
        let mut contents = String::new();
        file.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "first line\n");
    }

    #[test]
    fn fd_writer_is_a_writer() {
        let mut file = tempfile::tempfile().unwrap();
        let mut writer = FdWriter::new(file.as_raw_fd());
        write!(writer, "pid {} ", 42).unwrap();
        writer.write_all(b"done\n").unwrap();
        writer.flush().unwrap();

        file.rewind().unwrap();
        let mut contents = String::new();
        file.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "pid 42 done\n");
    }

    #[test]
    fn fd_writer_reports_bad_descriptors() {
        let err = FdWriter::new(-1).write(b"x").unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }
}
