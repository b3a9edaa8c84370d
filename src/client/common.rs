// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;

/// Races `fut` against `cancel` and a per-call timeout, the way every bounded
/// SSH connect/read/write in this crate is required to behave (SS5:
/// cancellation must interrupt in-flight waits, not just the task as a
/// whole). Specialized to [`SessionError`] rather than generic-over-`E`:
/// every caller in this crate already produces one, so there is nothing left
/// to convert.
pub(crate) async fn io_with_timeout<F, T>(
    label: &'static str,
    fut: F,
    io_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<T, SessionError>
where
    F: Future<Output = Result<T, SessionError>>,
{
    tokio::select! {
        () = cancel.cancelled() => Err(SessionError::Other(format!("{label} cancelled"))),
        res = timeout(io_timeout, fut) => {
            match res {
                Ok(Ok(v)) => Ok(v),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(SessionError::Timeout(label.to_string())),
            }
        }
    }
}
