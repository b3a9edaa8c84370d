// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The CLI surface. Out of scope for the core per SPEC_FULL.md SS1 ("the core
//! consumes a validated `Config` value and a `[]Host` slice"); this module is
//! the thin collaborator that builds those values from `clap` args and hands
//! them to `main`. Grounded on `clap`'s derive API as used across the pack
//! (`manifests/aitechnerd-sshore`, `manifests/lachen-nv-bare-metal-manager-core`)
//! and on the shared-option grouping of the original `cli/root.py`'s
//! `WithConfigCommand`/`WithInventoryCommand` (translated here to clap's
//! `#[command(flatten)]`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    let canon = abs
        .canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))?;

    Ok(canon)
}

/// Top-level `netcfgbu` CLI, mirroring the abstract surface in
/// SPEC_FULL.md SS6.
#[derive(Parser, Debug)]
#[command(name = "netcfgbu", about = "Concurrent, credential-aware SSH configuration backup for network device fleets")]
pub struct Cli {
    /// Path to the fleet configuration file.
    #[arg(long, global = true, env = "NETCFGBU_CONFIG", default_value = "netcfgbu.yaml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command that walks a (possibly filtered)
/// inventory: `backup`, `login`, `probe`.
#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    /// Overrides `defaults.inventory` from the config file.
    #[arg(long, env = "NETCFGBU_INVENTORY")]
    pub inventory: Option<String>,

    /// Include constraint (`field=value`, `@file.csv`); repeatable.
    #[arg(long = "limit")]
    pub limit: Vec<String>,

    /// Exclude constraint, same grammar as `--limit`; repeatable.
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,

    /// Overrides `max_startups` (the admission semaphore's capacity).
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=500))]
    pub batch: Option<u16>,

    /// Overrides each OS profile's capture timeout, in seconds.
    #[arg(long, value_parser = clap::value_parser!(u16).range(0..=300))]
    pub timeout: Option<u16>,

    /// SSH client verbosity, 1-3 (passed through to connection-layer logging).
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub debug_ssh: Option<u8>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connects to every matching host, captures the running configuration,
    /// and writes it under `configs_dir`.
    Backup(InventoryArgs),
    /// Performs the credential trial loop only; reports which credential (if
    /// any) authenticated per host.
    Login(InventoryArgs),
    /// TCP-probes port 22 on every matching host.
    Probe(InventoryArgs),
    /// Inventory maintenance.
    Inventory {
        #[command(subcommand)]
        action: InventoryAction,
    },
    /// Git-backed version control over `configs_dir`.
    Vcs {
        #[command(subcommand)]
        action: VcsAction,
    },
    /// Writes a starter config file and inventory into the current directory.
    Example,
}

#[derive(Subcommand, Debug)]
pub enum InventoryAction {
    /// Prints the filtered inventory's host names, one per line.
    List(InventoryArgs),
    /// Runs the inventory-build script named in the config file.
    Build,
}

#[derive(Subcommand, Debug)]
pub enum VcsAction {
    /// Clones (or pulls, if already cloned) every configured git repo.
    Prepare,
    /// Stages, commits, and pushes `configs_dir` to every configured repo.
    Save,
    /// Reports whether each repo's working tree is clean.
    Status,
}
