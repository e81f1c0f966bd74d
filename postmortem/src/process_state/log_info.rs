// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::shared::constants::TRUNCATION_NOTICE;
use postmortem_common::{MutexExt, RwLockExt};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, RwLock, TryLockError};

/// Lines owned by the caller and read back when a report is written. The caller keeps
/// appending; reports see whatever is there at the time.
pub type LogLines = Arc<RwLock<Vec<String>>>;

/// Named blocks of log lines appended to crash reports.
#[derive(Debug)]
pub struct ExtraLogInfo {
    entries: Mutex<BTreeMap<String, LogLines>>,
}

impl Default for ExtraLogInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtraLogInfo {
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Registers `lines` under `key`. `None` or an empty set of lines unregisters the key.
    pub fn set(&self, key: &str, lines: Option<LogLines>) {
        let mut entries = self.entries.lock_or_recover();
        match lines {
            Some(lines) if !lines.read_or_recover().is_empty() => {
                entries.insert(key.to_string(), lines);
            }
            _ => {
                entries.remove(key);
            }
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.lock_or_recover().keys().cloned().collect()
    }

    /// Writes `\n<key>:\n` and the lines of every entry, sorted by key.
    ///
    /// When `max_lines` is non-zero and more lines exist, stops after `max_lines` of them with
    /// a pointer to the full report. Lines without a trailing newline get one. Does not
    /// allocate, and skips anything whose lock is held elsewhere.
    pub fn emit<W: Write>(&self, w: &mut W, max_lines: usize) -> io::Result<()> {
        let entries = match self.entries.try_lock() {
            Ok(entries) => entries,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Ok(()),
        };
        let mut emitted = 0;
        for (key, lines) in entries.iter() {
            w.write_all(b"\n")?;
            w.write_all(key.as_bytes())?;
            w.write_all(b":\n")?;
            let lines = match lines.try_read() {
                Ok(lines) => lines,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => continue,
            };
            for line in lines.iter() {
                if max_lines != 0 {
                    if emitted >= max_lines {
                        return w.write_all(TRUNCATION_NOTICE.as_bytes());
                    }
                    emitted += 1;
                }
                w.write_all(line.as_bytes())?;
                if !line.ends_with('\n') {
                    w.write_all(b"\n")?;
                }
            }
        }
        Ok(())
    }
}

static EXTRA_LOG_INFO: ExtraLogInfo = ExtraLogInfo::new();

pub fn extra_log_info() -> &'static ExtraLogInfo {
    &EXTRA_LOG_INFO
}

pub fn set_extra_log_info_for_errors(key: &str, lines: Option<LogLines>) {
    EXTRA_LOG_INFO.set(key, lines);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(values: &[&str]) -> LogLines {
        Arc::new(RwLock::new(values.iter().map(|s| s.to_string()).collect()))
    }

    fn emitted(info: &ExtraLogInfo, max_lines: usize) -> String {
        let mut out = Vec::new();
        info.emit(&mut out, max_lines).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn all_lines_without_a_limit() {
        let info = ExtraLogInfo::new();
        info.set("session", Some(lines(&["a", "b\n"])));
        info.set("commands", Some(lines(&["ls"])));
        assert_eq!(
            emitted(&info, 0),
            "\ncommands:\nls\n\nsession:\na\nb\n"
        );
    }

    #[test]
    fn limit_truncates_with_a_notice() {
        let info = ExtraLogInfo::new();
        info.set("k", Some(lines(&["1", "2", "3", "4", "5"])));
        assert_eq!(emitted(&info, 3), format!("\nk:\n1\n2\n3\n{TRUNCATION_NOTICE}"));
        assert_eq!(emitted(&info, 5), "\nk:\n1\n2\n3\n4\n5\n");
    }

    #[test]
    fn limit_spans_entries() {
        let info = ExtraLogInfo::new();
        info.set("a", Some(lines(&["1", "2"])));
        info.set("b", Some(lines(&["3", "4"])));
        assert_eq!(
            emitted(&info, 3),
            format!("\na:\n1\n2\n\nb:\n3\n{TRUNCATION_NOTICE}")
        );
    }

    #[test]
    fn empty_or_missing_lines_unregister() {
        let info = ExtraLogInfo::new();
        info.set("k", Some(lines(&["x"])));
        info.set("k", Some(lines(&[])));
        assert!(info.keys().is_empty());

        info.set("k", Some(lines(&["x"])));
        info.set("k", None);
        assert!(info.keys().is_empty());
        assert_eq!(emitted(&info, 0), "");
    }

    #[test]
    fn later_appends_are_visible() {
        let info = ExtraLogInfo::new();
        let shared = lines(&["first"]);
        info.set("k", Some(shared.clone()));
        shared.write().unwrap().push("second".to_string());
        assert_eq!(emitted(&info, 0), "\nk:\nfirst\nsecond\n");
    }

    #[test]
    fn locked_lines_are_skipped() {
        let info = ExtraLogInfo::new();
        let shared = lines(&["hidden"]);
        info.set("k", Some(shared.clone()));
        let _writer = shared.write().unwrap();
        assert_eq!(emitted(&info, 0), "\nk:\n");
    }
}
