// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Run outcome aggregation: exception classification, CSV artifacts, and
//! the console summary.
//!
//! Grounded on `netcfgbu/cli/report.py::Report` and the authoritative
//! exception taxonomy in `netcfgbu/cli/common.py::handle_exception`.

use std::{collections::BTreeMap, path::Path, time::Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use csv::Writer;

use crate::error::SessionError;

/// `cli/report.py::Report.TIME_FORMAT`.
pub const TIME_FORMAT: &str = "%Y-%b-%d %I:%M:%S %p";

const LN_SEP: &str = "--------------------------------------------------------------";

/// Which command produced this report; gates whether `login.csv` is
/// written (SS9 open-question resolution: the later, gated source variant).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportKind {
    Backup,
    Login,
    Probe,
}

pub struct OkEntry {
    pub host: String,
    pub os_name: String,
    pub num_of_attempts: usize,
    pub login_used: String,
}

pub struct FailEntry {
    pub host: String,
    pub os_name: String,
    pub reason: String,
}

/// Accumulates per-host outcomes for one run and writes the artifacts
/// described in SS4.H.
pub struct Report {
    kind: ReportKind,
    start_wall: DateTime<Local>,
    start_instant: Instant,
    stop_wall: Option<DateTime<Local>>,
    stop_instant: Option<Instant>,
    ok: Vec<OkEntry>,
    fail: Vec<FailEntry>,
}

impl Report {
    pub fn start(kind: ReportKind) -> Self {
        Self {
            kind,
            start_wall: Local::now(),
            start_instant: Instant::now(),
            stop_wall: None,
            stop_instant: None,
            ok: Vec::new(),
            fail: Vec::new(),
        }
    }

    pub fn record_ok(&mut self, host: &str, os_name: &str, num_of_attempts: usize, login_used: &str) {
        self.ok.push(OkEntry {
            host: host.to_string(),
            os_name: os_name.to_string(),
            num_of_attempts,
            login_used: login_used.to_string(),
        });
    }

    pub fn record_fail(&mut self, host: &str, os_name: &str, reason: impl Into<String>) {
        self.fail.push(FailEntry {
            host: host.to_string(),
            os_name: os_name.to_string(),
            reason: reason.into(),
        });
    }

    pub fn stop(&mut self) {
        self.stop_wall = Some(Local::now());
        self.stop_instant = Some(Instant::now());
    }

    pub fn ok_count(&self) -> usize {
        self.ok.len()
    }

    pub fn fail_count(&self) -> usize {
        self.fail.len()
    }

    pub fn total(&self) -> usize {
        self.ok.len() + self.fail.len()
    }

    fn duration_secs(&self) -> f64 {
        let stop = self.stop_instant.unwrap_or_else(Instant::now);
        stop.duration_since(self.start_instant).as_secs_f64()
    }

    /// Writes `failures.csv` (and, for login runs, `login.csv`) into `dir`
    /// and prints the console summary. Mirrors `print_report`'s later,
    /// login-gated variant.
    pub fn print_report(&self, dir: &Path) -> Result<()> {
        println!("{LN_SEP}");
        println!(
            "SUMMARY: TOTAL={}, OK={}, FAIL={} / START={}, STOP={}, DURATION={:.1}s",
            self.total(),
            self.ok.len(),
            self.fail.len(),
            self.start_wall.format(TIME_FORMAT),
            self.stop_wall.unwrap_or_else(Local::now).format(TIME_FORMAT),
            self.duration_secs(),
        );

        if self.kind == ReportKind::Login {
            self.save_login_report(dir)?;
        }
        self.save_failure_report(dir)?;
        Ok(())
    }

    fn save_login_report(&self, dir: &Path) -> Result<()> {
        let path = dir.join("login.csv");
        let mut rows: Vec<&OkEntry> = self.ok.iter().collect();
        rows.sort_by(|a, b| a.host.cmp(&b.host));

        let mut wtr = Writer::from_path(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        wtr.write_record(["host", "os_name", "num_of_attempts", "login_used"])?;
        for r in &rows {
            wtr.write_record([
                r.host.as_str(),
                r.os_name.as_str(),
                &r.num_of_attempts.to_string(),
                r.login_used.as_str(),
            ])?;
        }
        wtr.flush()?;

        let mut summary: BTreeMap<(String, String), usize> = BTreeMap::new();
        for r in &rows {
            *summary
                .entry((r.os_name.clone(), r.login_used.clone()))
                .or_default() += 1;
        }
        print_summary_table("LOGIN.CSV", ["os_name", "login_used", "count"], &summary);
        Ok(())
    }

    fn save_failure_report(&self, dir: &Path) -> Result<()> {
        let path = dir.join("failures.csv");
        let mut rows: Vec<&FailEntry> = self.fail.iter().collect();
        rows.sort_by(|a, b| a.host.cmp(&b.host));

        let mut wtr = Writer::from_path(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        wtr.write_record(["host", "os_name", "reason"])?;
        for r in &rows {
            wtr.write_record([r.host.as_str(), r.os_name.as_str(), r.reason.as_str()])?;
        }
        wtr.flush()?;

        let mut summary: BTreeMap<(String, String), usize> = BTreeMap::new();
        for r in &rows {
            *summary
                .entry((r.os_name.clone(), r.reason.clone()))
                .or_default() += 1;
        }
        print_summary_table("FAILURES.CSV", ["os_name", "reason", "count"], &summary);
        Ok(())
    }
}

fn print_summary_table(
    title: &str,
    headers: [&str; 3],
    summary: &BTreeMap<(String, String), usize>,
) {
    println!("\n{title} SUMMARY");
    println!("{}\t{}\t{}", headers[0], headers[1], headers[2]);
    println!("-------\t----------\t-----");
    let mut total = 0;
    for ((a, b), count) in summary {
        println!("{a}\t{b}\t{count}");
        total += count;
    }
    println!("TOTAL\t\t{total}");
}

/// Classifies a session error into the failure label table in SS4.H/SS7.
pub fn classify(err: &SessionError) -> String {
    match err {
        SessionError::AllCredentialsFailed { .. } | SessionError::NoCredentials(_) => {
            "All credentials failed".to_string()
        },
        SessionError::PermissionDenied => "All credentials failed".to_string(),
        SessionError::ConnectionLost(_) => "ConnectionLost".to_string(),
        SessionError::HostKeyNotVerifiable(_) => "HostKeyNotVerifiable".to_string(),
        SessionError::NameResolutionError(_) => "NameResolutionError".to_string(),
        SessionError::Timeout(_) => "TimeoutError".to_string(),
        SessionError::NoRouteToHost(_) => "NoRouteToHost".to_string(),
        SessionError::Os(_) => "OSError".to_string(),
        SessionError::CommandFailed { command } => format!("{command} failed"),
        SessionError::JumpHostDown(_) => "JumpHostDown".to_string(),
        SessionError::Other(_) => "Other".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_timeout_variants_uniformly() {
        assert_eq!(
            classify(&SessionError::Timeout("Timeout awaiting prompt".to_string())),
            "TimeoutError"
        );
        assert_eq!(
            classify(&SessionError::Timeout(
                "Timeout getting running configuration".to_string()
            )),
            "TimeoutError"
        );
    }

    #[test]
    fn classifies_no_route_to_host() {
        assert_eq!(
            classify(&SessionError::NoRouteToHost("10.0.0.1".to_string())),
            "NoRouteToHost"
        );
    }

    #[test]
    fn totals_add_up() {
        let mut report = Report::start(ReportKind::Backup);
        report.record_ok("r1", "eos", 1, "admin");
        report.record_fail("r2", "ios", "ConnectionLost");
        assert_eq!(report.total(), 2);
        assert_eq!(report.ok_count(), 1);
        assert_eq!(report.fail_count(), 1);
    }
}
