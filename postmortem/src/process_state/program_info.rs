// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use postmortem_common::MutexExt;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::{Mutex, TryLockError};

#[derive(Debug, Default)]
struct Entries {
    values: BTreeMap<String, String>,
    /// `key: value` lines, re-rendered on every change so that printing never allocates.
    rendered: String,
}

impl Entries {
    fn render(&mut self) {
        self.rendered.clear();
        for (key, value) in &self.values {
            self.rendered.push_str(key);
            self.rendered.push_str(": ");
            self.rendered.push_str(value);
            self.rendered.push('\n');
        }
    }
}

/// Key/value facts about the program, printed at the top of every report.
#[derive(Debug)]
pub struct ProgramInfo {
    entries: Mutex<Entries>,
}

impl Default for ProgramInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramInfo {
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(Entries {
                values: BTreeMap::new(),
                rendered: String::new(),
            }),
        }
    }

    /// Sets `key` to `value`. An empty value removes the key.
    pub fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock_or_recover();
        if value.is_empty() {
            entries.values.remove(key);
        } else {
            entries.values.insert(key.to_string(), value.to_string());
        }
        entries.render();
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock_or_recover().values.get(key).cloned()
    }

    /// The lines [`ProgramInfo::print`] writes.
    pub fn snapshot(&self) -> String {
        self.entries.lock_or_recover().rendered.clone()
    }

    /// Writes every entry, sorted by key. Does not allocate.
    ///
    /// Gives up silently when another thread holds the lock, which would otherwise deadlock a
    /// thread that crashed while updating the info.
    pub fn print<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let entries = match self.entries.try_lock() {
            Ok(entries) => entries,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Ok(()),
        };
        w.write_all(entries.rendered.as_bytes())
    }
}

static PROGRAM_INFO: ProgramInfo = ProgramInfo::new();

pub fn program_info() -> &'static ProgramInfo {
    &PROGRAM_INFO
}

pub fn set_program_info_for_errors(key: &str, value: &str) {
    PROGRAM_INFO.set(key, value);
}

/// The value registered for `key`, empty when there is none.
pub fn get_program_info_for_errors(key: &str) -> String {
    PROGRAM_INFO.get(key).unwrap_or_default()
}
