// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::io::Write;

use netcfgbu_rs::cfg::config::Config;
use serial_test::serial;
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut f = NamedTempFile::new().expect("tmp file");
    f.write_all(yaml.as_bytes()).expect("write");
    f
}

#[test]
#[serial]
fn loads_a_full_fleet_config_and_creates_configs_dir() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let configs_dir = dir.path().join("configs");
    let inventory_path = dir.path().join("inventory.csv");
    std::fs::write(&inventory_path, "host\nsw1\n").expect("write inventory");

    let yaml = format!(
        "defaults:\n  configs_dir: \"{configs_dir}\"\n  inventory: \"{inventory}\"\n\
         linters: {{}}\n\
         os_name:\n  eos:\n    get_config: \"show running-config\"\n    pre_get_config:\n      - \"terminal length 0\"\n",
        configs_dir = configs_dir.display(),
        inventory = inventory_path.display(),
    );
    let f = write_config(&yaml);

    // SAFETY: test-only, single-threaded via #[serial].
    unsafe {
        std::env::set_var("NETCFGBU_DEFAULT_USERNAME", "admin");
        std::env::set_var("NETCFGBU_DEFAULT_PASSWORD", "secret");
    }

    let cfg = Config::load_from_file(f.path()).expect("config loads");

    unsafe {
        std::env::remove_var("NETCFGBU_DEFAULT_USERNAME");
        std::env::remove_var("NETCFGBU_DEFAULT_PASSWORD");
    }

    assert!(configs_dir.is_dir());
    assert_eq!(
        cfg.default_credential.as_ref().unwrap().0.username,
        "admin"
    );
    assert_eq!(cfg.os_name["eos"].get_config, "show running-config");
    assert_eq!(
        cfg.os_name["eos"].pre_get_config(),
        Some(vec!["terminal length 0".to_string()])
    );
}

#[test]
#[serial]
fn missing_default_credential_is_a_load_error() {
    unsafe {
        std::env::remove_var("NETCFGBU_DEFAULT_USERNAME");
        std::env::remove_var("NETCFGBU_DEFAULT_PASSWORD");
    }

    let dir = tempfile::tempdir().expect("tmp dir");
    let configs_dir = dir.path().join("configs");
    let inventory_path = dir.path().join("inventory.csv");
    std::fs::write(&inventory_path, "host\nsw1\n").unwrap();

    let yaml = format!(
        "defaults:\n  configs_dir: \"{}\"\n  inventory: \"{}\"\n",
        configs_dir.display(),
        inventory_path.display(),
    );
    let f = write_config(&yaml);

    assert!(Config::load_from_file(f.path()).is_err());
}

#[test]
#[serial]
fn undefined_linter_reference_is_rejected() {
    unsafe {
        std::env::set_var("NETCFGBU_DEFAULT_USERNAME", "admin");
        std::env::set_var("NETCFGBU_DEFAULT_PASSWORD", "secret");
    }

    let dir = tempfile::tempdir().expect("tmp dir");
    let configs_dir = dir.path().join("configs");
    let inventory_path = dir.path().join("inventory.csv");
    std::fs::write(&inventory_path, "host\nsw1\n").unwrap();

    let yaml = format!(
        "defaults:\n  configs_dir: \"{}\"\n  inventory: \"{}\"\nos_name:\n  eos:\n    linter: \"does_not_exist\"\n",
        configs_dir.display(),
        inventory_path.display(),
    );
    let f = write_config(&yaml);
    let err = Config::load_from_file(f.path()).unwrap_err();

    unsafe {
        std::env::remove_var("NETCFGBU_DEFAULT_USERNAME");
        std::env::remove_var("NETCFGBU_DEFAULT_PASSWORD");
    }

    assert!(err.to_string().contains("does_not_exist"));
}
