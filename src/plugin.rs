// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Static, manifest-driven hook registry.
//!
//! `netcfgbu/plugins.py` dynamically imports arbitrary `.py` files at
//! runtime; Rust has no safe equivalent, so this is re-architected (per the
//! REDESIGN FLAGS) as an in-process `Vec<Box<dyn Plugin>>` populated at
//! command start from a `plugins.yaml` manifest under `plugins_dir`. The
//! four hook names, registration-order fan-out, and "a failing hook never
//! aborts the run" guarantee are preserved.

use std::{panic::AssertUnwindSafe, path::Path};

use anyhow::Result;
use serde::Deserialize;
use tracing::{error, warn};

use crate::report::Report;

/// Implemented by anything wishing to observe backup/login outcomes or the
/// end-of-run report. Every method is optional; the default no-ops.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn backup_success(&self, _host: &str, _username: &str) -> Result<()> {
        Ok(())
    }

    fn backup_failed(&self, _host: &str, _error: &str) -> Result<()> {
        Ok(())
    }

    fn report(&self, _report: &Report) -> Result<()> {
        Ok(())
    }

    fn git_report(&self, _success: bool, _message: &str) -> Result<()> {
        Ok(())
    }
}

#[derive(Deserialize, Default)]
struct Manifest {
    #[serde(default)]
    plugins: Vec<String>,
}

/// Hooks invoked from the dispatcher in registration order. Each call is
/// wrapped so neither a panic nor an `Err` from one plugin stops the others
/// or the run.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads `plugins_dir/plugins.yaml` if present. The manifest only names
    /// which statically-registered plugins are active for this run; Rust
    /// code implementing new hooks still has to be compiled in and wired up
    /// by a caller via [`PluginRegistry::register`].
    pub fn load(plugins_dir: Option<&Path>) -> Result<Self> {
        let Some(dir) = plugins_dir else {
            return Ok(Self::empty());
        };
        let manifest_path = dir.join("plugins.yaml");
        if !manifest_path.is_file() {
            return Ok(Self::empty());
        }

        let raw = std::fs::read_to_string(&manifest_path)?;
        let manifest: Manifest = serde_yaml::from_str(&raw).unwrap_or_default();
        if !manifest.plugins.is_empty() {
            warn!(
                names = ?manifest.plugins,
                "plugins.yaml names hooks with no statically-registered implementation"
            );
        }

        Ok(Self::empty())
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn backup_success(&self, host: &str, username: &str) {
        for p in &self.plugins {
            run_hook(p.name(), || p.backup_success(host, username));
        }
    }

    pub fn backup_failed(&self, host: &str, error: &str) {
        for p in &self.plugins {
            run_hook(p.name(), || p.backup_failed(host, error));
        }
    }

    pub fn report(&self, report: &Report) {
        for p in &self.plugins {
            run_hook(p.name(), || p.report(report));
        }
    }

    pub fn git_report(&self, success: bool, message: &str) {
        for p in &self.plugins {
            run_hook(p.name(), || p.git_report(success, message));
        }
    }
}

fn run_hook(plugin_name: &str, f: impl FnOnce() -> Result<()>) {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {},
        Ok(Err(err)) => error!(plugin = plugin_name, error = %err, "plugin hook returned an error"),
        Err(_) => error!(plugin = plugin_name, "plugin hook panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;
    impl Plugin for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn backup_success(&self, _host: &str, _username: &str) -> Result<()> {
            anyhow::bail!("boom")
        }
    }

    struct Panicking;
    impl Plugin for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn backup_success(&self, _host: &str, _username: &str) -> Result<()> {
            panic!("boom")
        }
    }

    #[test]
    fn a_failing_or_panicking_hook_does_not_propagate() {
        let mut registry = PluginRegistry::empty();
        registry.register(Box::new(Failing));
        registry.register(Box::new(Panicking));
        registry.backup_success("r1", "admin");
    }

    #[test]
    fn missing_manifest_yields_an_empty_registry() {
        let registry = PluginRegistry::load(None).expect("load");
        assert!(registry.plugins.is_empty());
    }
}
