// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Runs the external script named by an inventory spec.
//!
//! Grounded on `netcfgbu/inventory.py::build`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InventorySpec {
    pub name: Option<String>,
    pub script: String,
}

/// Shells out to `spec.script` and logs a warning on non-zero exit, mirroring
/// the original's `os.system(script)` call: the whole string is handed to a
/// shell rather than split and exec'd directly, so pipes, redirects, and
/// `&&`/`;` chaining in `script` behave the same way they would on a command
/// line. No exception is raised on failure, only logged.
pub async fn build(spec: &InventorySpec) -> Result<std::process::ExitStatus> {
    if spec.script.trim().is_empty() {
        return Err(anyhow::anyhow!("inventory spec script must not be empty"));
    }

    info!(script = %spec.script, "Executing inventory build script");

    let status = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(&spec.script)
        .status()
        .await
        .with_context(|| format!("failed to execute inventory script: {}", spec.script))?;

    if !status.success() {
        warn!(code = ?status.code(), "inventory script returned non-zero return code");
    }

    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(script: &str) -> InventorySpec {
        InventorySpec {
            name: None,
            script: script.to_string(),
        }
    }

    #[tokio::test]
    async fn runs_a_pipeline_through_a_shell() {
        let status = build(&spec("echo hello | grep -q hello")).await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn runs_chained_commands() {
        let status = build(&spec("true && true")).await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn surfaces_failure_of_the_last_command_in_a_chain() {
        let status = build(&spec("true; false")).await.unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn empty_script_is_rejected_before_spawning_a_shell() {
        assert!(build(&spec("   ")).await.is_err());
    }
}
