// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use netcfgbu_rs::probe::probe;

use crate::integration_tests::common::require_live_target;

#[tokio::test]
async fn reaches_port_22_on_a_real_device() {
    require_live_target!(target);
    let reachable = probe(&target.host, Duration::from_secs(5), false)
        .await
        .expect("probe");
    assert!(reachable);
}
