// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The CLI entry point: the out-of-core collaborator that parses arguments,
//! loads the config and inventory, builds a [`Runtime`], and hands the task
//! set to the dispatcher. Everything interesting lives in the library crate;
//! this binary is glue.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Result, bail};
use clap::Parser;
use netcfgbu_rs::{
    cfg::{
        cli::{Cli, Command, InventoryAction, InventoryArgs, VcsAction, resolve_config_path},
        config::{Config, OsProfile},
        enums::DEFAULT_MAX_STARTUPS,
    },
    credentials::{self, Credential},
    dispatcher::{self, DispatchTask, Outcome},
    example,
    inventory::{builder, loader},
    probe,
    report::{Report, ReportKind},
    runtime::Runtime,
    ssh::session::{self, SessionArgs},
    vcs,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = resolve_config_path(&cli.config).unwrap_or_else(|_| PathBuf::from(&cli.config));
    let config = Config::load_from_file(&config_path)?;

    match cli.command {
        Command::Backup(args) => run_backup(config, args).await,
        Command::Login(args) => run_login(config, args).await,
        Command::Probe(args) => run_probe(config, args).await,
        Command::Inventory { action } => run_inventory(config, action).await,
        Command::Vcs { action } => run_vcs(config, action).await,
        Command::Example => {
            example::write_into(&std::env::current_dir()?)?;
            Ok(())
        },
    }
}

/// Resolves the effective inventory path, loads and filters it, and fails
/// the run per SS8 boundary behavior when nothing matches.
fn load_hosts(config: &Config, args: &InventoryArgs) -> Result<Vec<loader::Host>> {
    let path = args
        .inventory
        .clone()
        .unwrap_or_else(|| config.defaults.inventory.clone());
    let hosts = loader::load(&path, &args.limit, &args.exclude)?;
    if hosts.is_empty() {
        bail!("No inventory matching limits");
    }
    Ok(hosts)
}

fn effective_profile(config: &Config, host: &loader::Host, override_timeout: Option<u16>) -> OsProfile {
    let mut profile = config.os_profile(host.os_name());
    if let Some(timeout) = override_timeout {
        profile.timeout = u64::from(timeout);
    }
    profile
}

fn credentials_for(
    config: &Config,
    host: &loader::Host,
    profile: &OsProfile,
) -> Result<Vec<Credential>> {
    let default_credential = config
        .default_credential
        .as_ref()
        .expect("Config::load_from_file always resolves default_credential");
    Ok(credentials::resolve(
        host,
        &profile.credentials,
        default_credential,
        &config.credentials,
    ))
}

/// Installs a SIGINT handler that fires `token`, matching SS5's "respects an
/// external cancellation signal" requirement.
fn spawn_cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("received interrupt, cancelling outstanding sessions");
            child.cancel();
        }
    });
    token
}

async fn run_backup(config: Config, args: InventoryArgs) -> Result<()> {
    let hosts = load_hosts(&config, &args)?;
    let field_names = loader::field_names(&hosts);
    let max_startups = args
        .batch
        .map(usize::from)
        .unwrap_or(DEFAULT_MAX_STARTUPS);

    let runtime = Runtime::new(config, field_names, max_startups)?;
    let cancel = spawn_cancel_on_ctrl_c();

    if !runtime.config.jumphost.is_empty() {
        let all_up = runtime.jumphosts.connect_all(&hosts).await;
        if !all_up {
            warn!("one or more jump-host tunnels failed to connect");
        }
    }

    let configs_dir = PathBuf::from(&runtime.config.defaults.configs_dir);
    let mut tasks = Vec::with_capacity(hosts.len());

    for host in &hosts {
        let profile = effective_profile(&runtime.config, host, args.timeout);
        let credentials = credentials_for(&runtime.config, host, &profile)?;
        let linter_spec = runtime.config.linter_for(&profile).cloned();
        let tunnel = match runtime.jumphosts.lookup(host) {
            Some(spec) => Some(runtime.jumphosts.tunnel(spec)),
            None => None,
        };
        let admission = Arc::clone(&runtime.admission);
        let connect_timeout = Duration::from_secs(profile.timeout);
        let host_owned = host.clone();
        let configs_dir = configs_dir.clone();
        let cancel = cancel.clone();

        let future = Box::pin(async move {
            let tunnel = match tunnel {
                Some(Ok(conn)) => Some(conn),
                Some(Err(err)) => return Outcome::Backup(Err(err)),
                None => None,
            };
            let session_args = SessionArgs {
                host: &host_owned,
                profile: &profile,
                credentials: &credentials,
                tunnel: tunnel.as_deref(),
                admission,
                connect_timeout,
                cancel,
            };
            let result = session::backup_host(&session_args, &configs_dir, linter_spec.as_ref()).await;
            Outcome::Backup(result)
        });

        tasks.push(DispatchTask {
            host: host.name().to_string(),
            os_name: host.os_name().to_string(),
            future,
        });
    }

    let report = dispatcher::dispatch(tasks, ReportKind::Backup, &runtime.plugins, cancel).await;
    finish(report)
}

async fn run_login(config: Config, args: InventoryArgs) -> Result<()> {
    let hosts = load_hosts(&config, &args)?;
    let field_names = loader::field_names(&hosts);
    let max_startups = args
        .batch
        .map(usize::from)
        .unwrap_or(DEFAULT_MAX_STARTUPS);

    let runtime = Runtime::new(config, field_names, max_startups)?;
    let cancel = spawn_cancel_on_ctrl_c();
    let mut tasks = Vec::with_capacity(hosts.len());

    for host in &hosts {
        let profile = effective_profile(&runtime.config, host, args.timeout);
        let credentials = credentials_for(&runtime.config, host, &profile)?;
        let tunnel = match runtime.jumphosts.lookup(host) {
            Some(spec) => Some(runtime.jumphosts.tunnel(spec)),
            None => None,
        };
        let admission = Arc::clone(&runtime.admission);
        let connect_timeout = Duration::from_secs(profile.timeout);
        let host_owned = host.clone();
        let cancel = cancel.clone();

        let future = Box::pin(async move {
            let tunnel = match tunnel {
                Some(Ok(conn)) => Some(conn),
                Some(Err(err)) => return Outcome::Login(Err(err)),
                None => None,
            };
            let session_args = SessionArgs {
                host: &host_owned,
                profile: &profile,
                credentials: &credentials,
                tunnel: tunnel.as_deref(),
                admission,
                connect_timeout,
                cancel,
            };
            Outcome::Login(session::test_login(&session_args).await)
        });

        tasks.push(DispatchTask {
            host: host.name().to_string(),
            os_name: host.os_name().to_string(),
            future,
        });
    }

    let report = dispatcher::dispatch(tasks, ReportKind::Login, &runtime.plugins, cancel).await;
    finish(report)
}

async fn run_probe(config: Config, args: InventoryArgs) -> Result<()> {
    let hosts = load_hosts(&config, &args)?;
    let field_names = loader::field_names(&hosts);
    let max_startups = args
        .batch
        .map(usize::from)
        .unwrap_or(DEFAULT_MAX_STARTUPS);

    let runtime = Runtime::new(config, field_names, max_startups)?;
    let timeout = Duration::from_secs(u64::from(
        args.timeout.unwrap_or(crate_default_probe_timeout()),
    ));
    let mut tasks = Vec::with_capacity(hosts.len());

    for host in &hosts {
        let target = host.dial_target().unwrap_or_else(|| host.name()).to_string();
        let future = Box::pin(async move { Outcome::Probe(probe::probe(&target, timeout, false).await) });
        tasks.push(DispatchTask {
            host: host.name().to_string(),
            os_name: host.os_name().to_string(),
            future,
        });
    }

    let report = dispatcher::dispatch(
        tasks,
        ReportKind::Probe,
        &runtime.plugins,
        spawn_cancel_on_ctrl_c(),
    )
    .await;
    finish(report)
}

fn crate_default_probe_timeout() -> u16 {
    u16::try_from(netcfgbu_rs::cfg::enums::DEFAULT_PROBE_TIMEOUT).unwrap_or(10)
}

async fn run_inventory(config: Config, action: InventoryAction) -> Result<()> {
    match action {
        InventoryAction::List(args) => {
            let hosts = load_hosts(&config, &args)?;
            for host in &hosts {
                println!("{}", host.name());
            }
            Ok(())
        },
        InventoryAction::Build => {
            for spec in &config.inventory {
                builder::build(spec).await?;
            }
            Ok(())
        },
    }
}

async fn run_vcs(config: Config, action: VcsAction) -> Result<()> {
    let runtime = Runtime::new(config, Vec::new(), DEFAULT_MAX_STARTUPS)?;
    let repo_dir = PathBuf::from(&runtime.config.defaults.configs_dir);

    for spec in &runtime.config.git {
        match action {
            VcsAction::Prepare => vcs::prepare(spec, &repo_dir, &runtime.plugins).await?,
            VcsAction::Save => vcs::save(spec, &repo_dir, &runtime.plugins).await?,
            VcsAction::Status => {
                let clean = vcs::status(spec, &repo_dir).await?;
                println!("{}: {}", spec.display_name(), if clean { "clean" } else { "dirty" });
            },
        }
    }
    Ok(())
}

fn finish(report: Report) -> Result<()> {
    report.print_report(std::path::Path::new("."))?;
    info!("run complete");
    Ok(())
}
