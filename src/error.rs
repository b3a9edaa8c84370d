// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Exception taxonomy shared by the SSH session, probe, and report modules.
//!
//! Grounded on `netcfgbu/cli/common.py::handle_exception`: a compact set of
//! labels a device-fleet run can classify outcomes into, independent of the
//! specific OS error or SSH library variant that produced them.

use std::io;

use thiserror::Error;

/// Everything that can go wrong while driving a single host through the
/// session state machine. Each variant maps to exactly one [`crate::report::FailureLabel`].
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no credentials available for {0}")]
    NoCredentials(String),

    /// One credential was rejected. Recoverable inside the phase 1 auth
    /// loop (SS4.E): the caller moves on to the next credential.
    #[error("permission denied")]
    PermissionDenied,

    #[error("all credentials failed: attempted {attempts} credentials")]
    AllCredentialsFailed { attempts: usize },

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("host key not verifiable: {0}")]
    HostKeyNotVerifiable(String),

    #[error("name resolution failed for {0}")]
    NameResolutionError(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("no route to host: {0}")]
    NoRouteToHost(String),

    #[error("os error: {0}")]
    Os(#[from] io::Error),

    #[error("jump host down: {0}")]
    JumpHostDown(String),

    #[error("{command} failed")]
    CommandFailed { command: String },

    #[error("{0}")]
    Other(String),
}

impl SessionError {
    /// Errno value upstream treats as "no route to host" (`socket.EHOSTUNREACH`).
    pub const EHOSTUNREACH: i32 = 113;

    /// Classifies a raw I/O error the way the authoritative exception table
    /// does: EHOSTUNREACH gets its own label, everything else falls back to
    /// a generic OS error.
    pub fn from_io(err: io::Error) -> Self {
        if err.raw_os_error() == Some(Self::EHOSTUNREACH) {
            return SessionError::NoRouteToHost(err.to_string());
        }
        SessionError::Os(err)
    }
}
