// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use netcfgbu_rs::inventory::{
    filter::{FilterMode, build_filter},
    loader,
};

#[test]
fn file_backed_constraint_matches_hosts_named_in_the_csv() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let hostlist_path = dir.path().join("hostlist.csv");
    std::fs::write(&hostlist_path, "host,note\nsw1,first\nsw3,third\n").unwrap();

    let inventory_path = dir.path().join("inventory.csv");
    std::fs::write(
        &inventory_path,
        "host,os_name\nsw1,eos\nsw2,ios\nsw3,eos\n",
    )
    .unwrap();

    let hosts = loader::read_csv(&inventory_path).expect("read inventory");
    let fields = loader::field_names(&hosts);
    let constraint = format!("@{}", hostlist_path.display());
    let filter = build_filter(&[constraint], &fields, FilterMode::Include).expect("filter");

    let kept: Vec<&str> = hosts.iter().filter(|h| filter(h)).map(|h| h.name()).collect();
    assert_eq!(kept, vec!["sw1", "sw3"]);
}

#[test]
fn missing_csv_file_constraint_is_rejected() {
    let fields = vec!["host".to_string()];
    let err = build_filter(&["@/nonexistent/path.csv".to_string()], &fields, FilterMode::Include)
        .unwrap_err();
    assert!(err.to_string().contains("File not found"));
}

#[test]
fn non_csv_file_constraint_is_rejected() {
    let fields = vec!["host".to_string()];
    let err = build_filter(&["@hosts.txt".to_string()], &fields, FilterMode::Include).unwrap_err();
    assert!(err.to_string().contains("not a CSV file"));
}

#[test]
fn load_applies_a_host_file_include_end_to_end() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let hostlist_path = dir.path().join("keep.csv");
    std::fs::write(&hostlist_path, "host\nrouter1.dc1\n").unwrap();

    let inventory_path = dir.path().join("inventory.csv");
    std::fs::write(
        &inventory_path,
        "host,os_name\nswitch1.nyc1,eos\nrouter1.dc1,ios\n",
    )
    .unwrap();

    let hosts = loader::load(
        &inventory_path,
        &[format!("@{}", hostlist_path.display())],
        &[],
    )
    .expect("load");

    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].name(), "router1.dc1");
}
