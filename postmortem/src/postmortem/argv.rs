// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::signal_safe::cstr_eq;
use libc::c_char;
use std::ffi::{CStr, CString};
use std::ptr;

/// Template entry replaced by the command path.
pub const COMMAND_PLACEHOLDER: &CStr = c"$cmd";

/// Expands `template` into `dst` as a null-terminated argument vector.
///
/// `$cmd` becomes `command`, an entry equal to a substitution key becomes its value, anything
/// else is passed through. The pointers borrow from the inputs. Returns false, leaving `dst`
/// untouched, if the template is empty or does not fit in `dst` with its terminator.
/// Async-signal-safe.
pub fn build_argv(
    dst: &mut [*const c_char],
    command: &CStr,
    template: &[CString],
    substitutions: &[(&CStr, &CStr)],
) -> bool {
    if template.is_empty() || template.len() >= dst.len() {
        return false;
    }
    for (slot, entry) in dst.iter_mut().zip(template) {
        let entry = entry.as_ptr();
        // Safety: every pointer compared comes from a live C string.
        *slot = if unsafe { cstr_eq(entry, COMMAND_PLACEHOLDER.as_ptr()) } {
            command.as_ptr()
        } else {
            substitutions
                .iter()
                .find(|(key, _)| unsafe { cstr_eq(entry, key.as_ptr()) })
                .map_or(entry, |(_, value)| value.as_ptr())
        };
    }
    dst[template.len()] = ptr::null();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::constants::MAX_ARGS;

    fn template(entries: &[&str]) -> Vec<CString> {
        entries.iter().map(|e| CString::new(*e).unwrap()).collect()
    }

    fn read_back(argv: &[*const c_char]) -> Vec<String> {
        argv.iter()
            .take_while(|p| !p.is_null())
            .map(|p| unsafe { CStr::from_ptr(*p) }.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn placeholders_are_substituted() {
        let mut argv = [ptr::null(); MAX_ARGS];
        let template = template(&["$cmd", "--pid", "$pid", "--log=$log", "$log", "$unknown"]);
        assert!(build_argv(
            &mut argv,
            c"/usr/bin/helper",
            &template,
            &[(c"$pid", c"123"), (c"$log", c"/tmp/st_prog.123")],
        ));
        assert_eq!(
            read_back(&argv),
            [
                "/usr/bin/helper",
                "--pid",
                "123",
                "--log=$log",
                "/tmp/st_prog.123",
                "$unknown"
            ]
        );
        assert!(argv[6].is_null());
    }

    #[test]
    fn full_vectors_fit_with_their_terminator() {
        let mut argv = [ptr::null(); MAX_ARGS];
        let fits = template(&["$cmd"; MAX_ARGS - 1]);
        assert!(build_argv(&mut argv, c"/bin/true", &fits, &[]));
        assert_eq!(read_back(&argv).len(), MAX_ARGS - 1);
        assert!(argv[MAX_ARGS - 1].is_null());
    }

    #[test]
    fn oversized_or_empty_templates_fail() {
        let mut argv = [ptr::null(); MAX_ARGS];
        let too_long = template(&["x"; MAX_ARGS]);
        assert!(!build_argv(&mut argv, c"/bin/true", &too_long, &[]));
        assert!(argv.iter().all(|p| p.is_null()));
        assert!(!build_argv(&mut argv, c"/bin/true", &[], &[]));
        assert!(!build_argv(&mut [], c"/bin/true", &template(&["$cmd"]), &[]));
    }
}
