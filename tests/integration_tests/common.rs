// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Shared helpers for tests that need a real SSH-reachable device.

pub struct LiveTarget {
    pub host: String,
    pub username: String,
    pub password: String,
    pub get_config: String,
}

/// Reads the live-target environment variables. Returns `None` when
/// `NETCFGBU_TEST_SSH_HOST` is unset, which every caller treats as "skip this
/// test", not as a failure.
pub fn live_ssh_target() -> Option<LiveTarget> {
    let host = std::env::var("NETCFGBU_TEST_SSH_HOST").ok()?;
    let username =
        std::env::var("NETCFGBU_TEST_SSH_USERNAME").unwrap_or_else(|_| "admin".to_string());
    let password = std::env::var("NETCFGBU_TEST_SSH_PASSWORD").unwrap_or_default();
    let get_config = std::env::var("NETCFGBU_TEST_SSH_COMMAND")
        .unwrap_or_else(|_| "echo netcfgbu-rs-integration-test".to_string());
    Some(LiveTarget {
        host,
        username,
        password,
        get_config,
    })
}

/// Returns from the calling test (printing a skip note) when no live target
/// is configured, otherwise binds `$target: LiveTarget`.
macro_rules! require_live_target {
    ($target:ident) => {
        let Some($target) = crate::integration_tests::common::live_ssh_target() else {
            eprintln!("skipping: NETCFGBU_TEST_SSH_HOST not set");
            return;
        };
    };
}

pub(crate) use require_live_target;
