// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use netcfgbu_rs::{
    cfg::config::OsProfile,
    credentials::{Credential, Secret},
    inventory::loader::Host,
    ssh::session::{SessionArgs, backup_host, test_login},
};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::integration_tests::common::require_live_target;

fn live_host(target: &crate::integration_tests::common::LiveTarget) -> Host {
    let mut fields = BTreeMap::new();
    fields.insert("host".to_string(), "live-target".to_string());
    fields.insert("ipaddr".to_string(), target.host.clone());
    Host { fields }
}

#[tokio::test]
async fn logs_in_with_the_configured_credential() {
    require_live_target!(target);
    let host = live_host(&target);
    let profile = OsProfile::default();
    let credentials = vec![Credential {
        username: target.username.clone(),
        password: Secret::new(target.password.clone()),
    }];
    let admission = Arc::new(Semaphore::new(1));

    let args = SessionArgs {
        host: &host,
        profile: &profile,
        credentials: &credentials,
        tunnel: None,
        admission,
        connect_timeout: Duration::from_secs(30),
        cancel: CancellationToken::new(),
    };

    let outcome = test_login(&args).await.expect("test_login");
    assert_eq!(outcome.username.as_deref(), Some(target.username.as_str()));
}

#[tokio::test]
async fn captures_and_writes_a_real_device_config() {
    require_live_target!(target);
    let dir = tempfile::tempdir().expect("tmp dir");

    let host = live_host(&target);
    let mut profile = OsProfile::default();
    profile.get_config = target.get_config.clone();
    profile.timeout = 30;

    let credentials = vec![Credential {
        username: target.username.clone(),
        password: Secret::new(target.password.clone()),
    }];
    let admission = Arc::new(Semaphore::new(1));

    let args = SessionArgs {
        host: &host,
        profile: &profile,
        credentials: &credentials,
        tunnel: None,
        admission,
        connect_timeout: Duration::from_secs(30),
        cancel: CancellationToken::new(),
    };

    let username = backup_host(&args, dir.path(), None).await.expect("backup_host");
    assert_eq!(username, target.username);
    assert!(dir.path().join("live-target.cfg").is_file());
}
