// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use netcfgbu_rs::report::{Report, ReportKind};

#[test]
fn login_report_writes_login_csv_sorted_by_host() {
    let dir = tempfile::tempdir().expect("tmp dir");

    let mut report = Report::start(ReportKind::Login);
    report.record_ok("sw2", "eos", 1, "admin");
    report.record_ok("sw1", "eos", 2, "backup-admin");
    report.record_fail("sw3", "ios", "All credentials failed");
    report.stop();

    report.print_report(dir.path()).expect("print_report");

    let login_csv = std::fs::read_to_string(dir.path().join("login.csv")).expect("login.csv");
    let mut lines = login_csv.lines();
    assert_eq!(lines.next().unwrap(), "host,os_name,num_of_attempts,login_used");
    assert_eq!(lines.next().unwrap(), "sw1,eos,2,backup-admin");
    assert_eq!(lines.next().unwrap(), "sw2,eos,1,admin");
    assert!(lines.next().is_none());

    let failures_csv =
        std::fs::read_to_string(dir.path().join("failures.csv")).expect("failures.csv");
    assert!(failures_csv.contains("sw3,ios,All credentials failed"));
}

#[test]
fn backup_reports_skip_login_csv_but_still_write_failures() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let mut report = Report::start(ReportKind::Backup);
    report.record_ok("sw1", "eos", 1, "admin");
    report.record_fail("sw2", "eos", "ConnectionLost");
    report.stop();
    report.print_report(dir.path()).expect("print_report");

    assert!(!dir.path().join("login.csv").exists());
    assert!(dir.path().join("failures.csv").is_file());
}

#[test]
fn probe_reports_skip_login_csv_too() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let mut report = Report::start(ReportKind::Probe);
    report.record_ok("sw1", "eos", 1, "n/a");
    report.stop();
    report.print_report(dir.path()).expect("print_report");

    assert!(!dir.path().join("login.csv").exists());
}
