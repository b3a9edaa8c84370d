// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! CLI prompt pattern compilation and byte-level matching.
//!
//! Grounded on `netcfgbu/connectors/basic.py`'s `prompt_pattern` class
//! attribute and `consts.PROMPT_VALID_CHARS`/`PROMPT_MAX_CHARS`. Matching
//! stays at the byte level per SPEC_FULL.md SS9 ("Prompt-matching byte
//! semantics") - device output may not be valid UTF-8 until the final save.

use once_cell::sync::Lazy;
use regex::bytes::Regex;

const PROMPT_VALID_CHARS: &str = r"a-z0-9.\-_@()/:~";
const PROMPT_MAX_CHARS: usize = 65;

static DEFAULT_PROMPT: Lazy<Regex> = Lazy::new(|| {
    let body = format!(r"[{PROMPT_VALID_CHARS}]{{1,{PROMPT_MAX_CHARS}}}\s*[#>$]");
    compile_wrapped(&body).expect("default prompt pattern is valid")
});

fn compile_wrapped(body: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?mi)^\r?({body})\s*$"))
}

/// A compiled prompt pattern, either the shared default or a per-OS-profile
/// override.
pub struct PromptPattern(Regex);

impl PromptPattern {
    pub fn default_pattern() -> Self {
        Self(DEFAULT_PROMPT.clone())
    }

    pub fn from_override(body: &str) -> Result<Self, regex::Error> {
        Ok(Self(compile_wrapped(body)?))
    }

    /// Tries to match the prompt against the tail of `buffer` following the
    /// last `\n`. Returns the matched prompt text (without trailing
    /// whitespace) and the byte offset of that last newline on success.
    pub fn match_tail<'a>(&self, buffer: &'a [u8]) -> Option<(&'a [u8], usize)> {
        let nl_at = memchr_rfind(b'\n', buffer);
        let tail_start = nl_at.map(|i| i + 1).unwrap_or(0);
        let tail = &buffer[tail_start..];
        let caps = self.0.captures(tail)?;
        let prompt = caps.get(1)?.as_bytes();
        Some((prompt, nl_at.unwrap_or(0)))
    }
}

fn memchr_rfind(needle: u8, haystack: &[u8]) -> Option<usize> {
    haystack.iter().rposition(|&b| b == needle)
}
