// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Deterministic captured-config trimming.
//!
//! Grounded on `netcfgbu/linter.py::lint_content`.

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct LinterSpec {
    pub config_starts_after: Option<String>,
    pub config_ends_at: Option<String>,
}

/// Trims `content` between the configured markers, per SS4.F:
/// - `config_starts_after`: drop everything up to and including the first
///   matching line.
/// - `config_ends_at`: drop everything from the last `"\n" + marker` onward.
pub fn lint_content(content: &str, spec: &LinterSpec) -> String {
    let mut start = 0usize;
    let mut end = content.len();

    if let Some(starts_after) = &spec.config_starts_after {
        if let Ok(re) = Regex::new(&format!("(?m)^{starts_after}.*$")) {
            if let Some(m) = re.find(content) {
                start = (m.end() + 1).min(content.len());
            }
        }
    }

    if let Some(ends_at) = &spec.config_ends_at {
        let marker = format!("\n{ends_at}");
        if let Some(found) = content.rfind(&marker) {
            if found > 0 {
                end = found;
            }
        }
    }

    if start >= end {
        return String::new();
    }

    content[start..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_between_markers() {
        let spec = LinterSpec {
            config_starts_after: Some("!Time:".to_string()),
            config_ends_at: Some("! end-test-marker".to_string()),
        };
        let input = "!Command:...\n!Time: x\n<BODY>\n! end-test-marker";
        assert_eq!(lint_content(input, &spec), "<BODY>\n");
    }

    #[test]
    fn is_idempotent() {
        let spec = LinterSpec {
            config_starts_after: Some("!Time:".to_string()),
            config_ends_at: Some("! end-test-marker".to_string()),
        };
        let input = "!Command:...\n!Time: x\n<BODY>\n! end-test-marker";
        let once = lint_content(input, &spec);
        let twice = lint_content(&once, &spec);
        assert_eq!(once, twice);
    }

    #[test]
    fn no_markers_returns_full_content() {
        let spec = LinterSpec::default();
        assert_eq!(lint_content("hello\nworld", &spec), "hello\nworld");
    }
}
