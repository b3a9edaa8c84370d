// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The explicit value that replaces the process-wide mutable singletons a
//! straightforward port would otherwise rely on (module-level globals for
//! the admission limit, jump-host routing, and plugin hooks).
//!
//! One `Runtime`, created at command start, holds the admission semaphore,
//! jump-host registry, plugin registry, logger guard, and configuration,
//! threaded explicitly through the dispatcher and session factories.

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use tokio::sync::Semaphore;
use tracing_appender::non_blocking::WorkerGuard;

use crate::{cfg::config::Config, jumphost::JumpHostRegistry, plugin::PluginRegistry};

pub struct Runtime {
    pub config: Config,
    pub admission: Arc<Semaphore>,
    pub jumphosts: JumpHostRegistry,
    pub plugins: PluginRegistry,
    _logger_guard: Option<WorkerGuard>,
}

impl Runtime {
    /// Initializes logging (if `config.logging` is set), the jump-host
    /// registry, and the plugin registry, and wraps them with a fresh
    /// admission semaphore of capacity `max_startups`.
    pub fn new(config: Config, inventory_field_names: Vec<String>, max_startups: usize) -> Result<Self> {
        let logger_guard = match &config.logging {
            Some(log_cfg) => Some(crate::cfg::logger::init(log_cfg)?),
            None => None,
        };

        let jumphosts = JumpHostRegistry::new(config.jumphost.clone(), inventory_field_names);
        let plugins_dir = config.defaults.plugins_dir.as_ref().map(PathBuf::from);
        let plugins = PluginRegistry::load(plugins_dir.as_deref())?;

        Ok(Self {
            config,
            admission: Arc::new(Semaphore::new(max_startups)),
            jumphosts,
            plugins,
            _logger_guard: logger_guard,
        })
    }

    /// Swaps in a differently-sized admission semaphore (the CLI `--batch`
    /// override). Only meaningful before dispatch begins: permits already
    /// acquired under the old semaphore are unaffected, per SS5.
    pub fn set_max_startups(&mut self, n: usize) {
        self.admission = Arc::new(Semaphore::new(n));
    }
}
