// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub enum Transition<S, R> {
    Next(S, R),
    Stay(R),
    Done(R),
}

pub trait StateMachine<Ctx, RespCtx>: Sized {
    type StepResult<'a>: Future<Output = RespCtx> + Send + 'a
    where
        Self: 'a,
        RespCtx: 'a,
        Ctx: 'a;

    fn step<'a>(&'a mut self, ctx: &'a mut Ctx) -> Self::StepResult<'a>;
}

/// Strips an echoed command line (and the newline following it) from
/// captured CLI output, the way `connectors/basic.py::run_command` slices
/// off `wr_cmd` before returning: both the non-PTY exec path and the PTY
/// `get_config` step echo the command they just wrote, and neither belongs
/// in the saved configuration.
pub fn trim_echoed_command(output: &[u8], command: &str) -> Vec<u8> {
    let command = command.as_bytes();
    if output.starts_with(command) {
        let rest = &output[command.len()..];
        let rest = rest.strip_prefix(b"\n").unwrap_or(rest);
        rest.to_vec()
    } else {
        output.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_echoed_command_and_following_newline() {
        let out = trim_echoed_command(b"show running-config\nhostname r1\n", "show running-config");
        assert_eq!(out, b"hostname r1\n");
    }

    #[test]
    fn leaves_output_unchanged_without_echo() {
        let out = trim_echoed_command(b"hostname r1\n", "show running-config");
        assert_eq!(out, b"hostname r1\n");
    }
}
