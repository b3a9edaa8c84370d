// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Bounded-admission concurrent fan-out and as-completed outcome
//! aggregation.
//!
//! Grounded on `netcfgbu/aiofut.py`'s `as_completed`-style consumption loop,
//! translated to `tokio::task::JoinSet`. The admission gate itself lives
//! inside the session state machine (SS4.E); this module only starts tasks
//! eagerly and consumes their completions as they arrive.

use futures::future::BoxFuture;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    error::SessionError,
    plugin::PluginRegistry,
    report::{Report, ReportKind, classify},
    ssh::session::LoginOutcome,
};

/// The three kinds of per-task completion value the dispatcher's API
/// handles: backup/username, login/username-or-none, probe/reachable.
pub enum Outcome {
    Backup(Result<String, SessionError>),
    Login(Result<LoginOutcome, SessionError>),
    Probe(Result<bool, SessionError>),
}

/// One unit of dispatched work: the host/os_name to label completions with,
/// and the future performing the actual session work.
pub struct DispatchTask {
    pub host: String,
    pub os_name: String,
    pub future: BoxFuture<'static, Outcome>,
}

/// Starts every task eagerly, consumes completions in arrival order (not
/// input order), and aggregates them into a [`Report`]. Logs
/// `DONE (k/N): <host> - PASS|<reason>` per completion. Respects `cancel`:
/// an in-flight task still running when `cancel` fires is treated as a
/// generic failure rather than left to run unbounded.
pub async fn dispatch(
    tasks: Vec<DispatchTask>,
    kind: ReportKind,
    plugins: &PluginRegistry,
    cancel: CancellationToken,
) -> Report {
    let total = tasks.len();
    let mut report = Report::start(kind);
    let mut join_set = JoinSet::new();

    for task in tasks {
        let cancel = cancel.clone();
        join_set.spawn(async move {
            let outcome = tokio::select! {
                outcome = task.future => outcome,
                () = cancel.cancelled() => cancelled_outcome(kind),
            };
            (task.host, task.os_name, outcome)
        });
    }

    let mut completed = 0usize;
    while let Some(joined) = join_set.join_next().await {
        completed += 1;
        let (host, os_name, outcome) = match joined {
            Ok(v) => v,
            Err(join_err) => {
                warn!(error = %join_err, "dispatched task panicked");
                continue;
            },
        };
        record_outcome(&mut report, plugins, &host, &os_name, outcome, completed, total);
    }

    report.stop();
    plugins.report(&report);
    report
}

/// Builds the fallback outcome for a task still running when `cancel` fires,
/// shaped to match `kind` so a cancelled login/probe run isn't misreported
/// through the backup arm (wrong classification, wrong plugin hook).
/// Every task handed to one `dispatch` call shares the same `kind` (SS4.G:
/// one task set per command), so `kind` alone is enough to pick the variant.
fn cancelled_outcome(kind: ReportKind) -> Outcome {
    let err = SessionError::Other("cancelled".to_string());
    match kind {
        ReportKind::Backup => Outcome::Backup(Err(err)),
        ReportKind::Login => Outcome::Login(Err(err)),
        ReportKind::Probe => Outcome::Probe(Err(err)),
    }
}

fn record_outcome(
    report: &mut Report,
    plugins: &PluginRegistry,
    host: &str,
    os_name: &str,
    outcome: Outcome,
    seq: usize,
    total: usize,
) {
    match outcome {
        Outcome::Backup(Ok(username)) => {
            report.record_ok(host, os_name, 1, &username);
            plugins.backup_success(host, &username);
            info!("DONE ({seq}/{total}): {host} - PASS");
        },
        Outcome::Backup(Err(err)) => {
            let reason = classify(&err);
            plugins.backup_failed(host, &err.to_string());
            report.record_fail(host, os_name, reason.clone());
            info!("DONE ({seq}/{total}): {host} - {reason}");
        },
        Outcome::Login(Ok(LoginOutcome {
            username: Some(username),
            attempts,
        })) => {
            report.record_ok(host, os_name, attempts, &username);
            info!("DONE ({seq}/{total}): {host} - PASS");
        },
        Outcome::Login(Ok(LoginOutcome { username: None, .. })) => {
            report.record_fail(host, os_name, "All credentials failed");
            info!("DONE ({seq}/{total}): {host} - All credentials failed");
        },
        Outcome::Login(Err(err)) => {
            let reason = classify(&err);
            report.record_fail(host, os_name, reason.clone());
            info!("DONE ({seq}/{total}): {host} - {reason}");
        },
        Outcome::Probe(Ok(true)) => {
            report.record_ok(host, os_name, 1, "");
            info!("DONE ({seq}/{total}): {host} - PASS");
        },
        Outcome::Probe(Ok(false)) => {
            report.record_fail(host, os_name, "probe failed");
            info!("DONE ({seq}/{total}): {host} - probe failed");
        },
        Outcome::Probe(Err(err)) => {
            let reason = classify(&err);
            report.record_fail(host, os_name, reason.clone());
            info!("DONE ({seq}/{total}): {host} - {reason}");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatch_aggregates_mixed_outcomes() {
        let plugins = PluginRegistry::empty();
        let tasks = vec![
            DispatchTask {
                host: "r1".to_string(),
                os_name: "eos".to_string(),
                future: Box::pin(async { Outcome::Backup(Ok("admin".to_string())) }),
            },
            DispatchTask {
                host: "r2".to_string(),
                os_name: "ios".to_string(),
                future: Box::pin(async {
                    Outcome::Backup(Err(SessionError::ConnectionLost("reset".to_string())))
                }),
            },
        ];

        let report = dispatch(tasks, ReportKind::Backup, &plugins, CancellationToken::new()).await;
        assert_eq!(report.total(), 2);
        assert_eq!(report.ok_count(), 1);
        assert_eq!(report.fail_count(), 1);
    }

    #[test]
    fn cancelled_outcome_matches_the_dispatch_kind() {
        assert!(matches!(
            cancelled_outcome(ReportKind::Login),
            Outcome::Login(Err(_))
        ));
        assert!(matches!(
            cancelled_outcome(ReportKind::Probe),
            Outcome::Probe(Err(_))
        ));
        assert!(matches!(
            cancelled_outcome(ReportKind::Backup),
            Outcome::Backup(Err(_))
        ));
    }

    #[tokio::test]
    async fn cancellation_during_a_login_run_is_reported_as_a_login_failure_not_backup() {
        let plugins = PluginRegistry::empty();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let tasks = vec![DispatchTask {
            host: "r1".to_string(),
            os_name: "eos".to_string(),
            future: Box::pin(std::future::pending()),
        }];

        let report = dispatch(tasks, ReportKind::Login, &plugins, cancel).await;
        assert_eq!(report.fail_count(), 1);
        assert_eq!(report.ok_count(), 0);
    }
}
