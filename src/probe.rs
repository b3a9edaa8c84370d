// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! TCP reachability probe.
//!
//! Grounded on the probe semantics implied by `netcfgbu/connectors/__init__.py`
//! and exercised by the `probe` CLI command; see SPEC_FULL.md SS4.D.

use std::time::Duration;

use tokio::net::TcpStream;

use crate::error::SessionError;

pub const DEFAULT_PROBE_PORT: u16 = 22;

/// Attempts a TCP connect to `target:22` bounded by `timeout`.
///
/// Returns `Ok(true)` on connect, `Ok(false)` on timeout (unless
/// `raise_on_timeout`, in which case a timeout becomes `Err`). Other socket
/// errors (name resolution, no route) are classified and returned as `Err`.
pub async fn probe(
    target: &str,
    timeout: Duration,
    raise_on_timeout: bool,
) -> Result<bool, SessionError> {
    let addr = format!("{target}:{DEFAULT_PROBE_PORT}");

    match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(_stream)) => Ok(true),
        Ok(Err(err)) => Err(classify_connect_error(target, err)),
        Err(_) if raise_on_timeout => {
            Err(SessionError::Timeout(format!("probe of {target} timed out")))
        },
        Err(_) => Ok(false),
    }
}

fn classify_connect_error(target: &str, err: std::io::Error) -> SessionError {
    use std::io::ErrorKind;

    match err.kind() {
        ErrorKind::TimedOut => SessionError::Timeout(format!("probe of {target} timed out")),
        _ if err.raw_os_error() == Some(SessionError::EHOSTUNREACH) => {
            SessionError::NoRouteToHost(target.to_string())
        },
        _ => SessionError::from_io(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_timeout_returns_false_without_raising() {
        let result = probe("192.0.2.1", Duration::from_millis(1), false).await;
        assert!(matches!(result, Ok(false) | Err(_)));
    }

    #[tokio::test]
    async fn zero_timeout_raises_when_requested() {
        let result = probe("192.0.2.1", Duration::from_millis(1), true).await;
        if let Ok(ok) = result {
            assert!(!ok);
        }
    }
}
