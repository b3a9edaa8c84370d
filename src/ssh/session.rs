// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-host SSH session: the phase 1 credential trial loop, variant-
//! dispatched connect/capture, and the phase 3 atomic save.
//!
//! Grounded on `netcfgbu/connectors/basic.py::BasicSSHConnector` (the
//! default, non-interactive-login connector) and `connectors/ssh.py`'s
//! `LoginPromptUserPass` (the `User:`/`Password:` interactive variant). The
//! two connector shapes are modeled as a closed `SessionVariant` sum type
//! dispatched via `enum_dispatch` over `SshSessionOps`, the same pattern the
//! teacher uses for its login state machine's `LoginStates` enum, here
//! generalized from a fixed enum of states to a fixed enum of connector
//! variants.

use std::{path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use enum_dispatch::enum_dispatch;
use russh::{Channel, ChannelMsg, client::Msg};
use tokio::{fs, sync::Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    cfg::config::{ConnectionVariant, OsProfile},
    client::{
        common::io_with_timeout,
        connection::{ConnectArgs, SshConnection},
    },
    credentials::Credential,
    error::SessionError,
    inventory::loader::Host,
    linter,
    ssh::prompt::PromptPattern,
    state_machine::{capture, common::trim_echoed_command},
};

/// A live connection, plus the PTY channel if one was opened during
/// `connect` (needed whenever `pre_get_config` is set or the variant is
/// `prompt_login`).
pub struct Connected {
    pub conn: SshConnection,
    pub pty: Option<Channel<Msg>>,
}

/// Connect and capture, parameterized over the two connector shapes. `close`
/// is not part of the trait: every [`Connected`] closes the same way
/// (`SshConnection::close`), so there's nothing to vary.
#[async_trait]
#[enum_dispatch]
pub trait SshSessionOps {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        credential: &Credential,
        profile: &OsProfile,
        tunnel: Option<&SshConnection>,
        connect_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Connected, SessionError>;

    async fn capture(
        &self,
        connected: &mut Connected,
        profile: &OsProfile,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, SessionError>;
}

fn prompt_pattern(profile: &OsProfile) -> Result<PromptPattern, SessionError> {
    match &profile.prompt_pattern {
        Some(body) => PromptPattern::from_override(body)
            .map_err(|e| SessionError::Other(format!("invalid prompt_pattern: {e}"))),
        None => Ok(PromptPattern::default_pattern()),
    }
}

async fn dial(
    host: &str,
    port: u16,
    credential: &Credential,
    tunnel: Option<&SshConnection>,
    connect_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<SshConnection, SessionError> {
    let args = ConnectArgs {
        host,
        port,
        credential,
        connect_timeout,
        cancel,
    };
    match tunnel {
        Some(tunnel) => SshConnection::connect_via_tunnel(tunnel, &args).await,
        None => SshConnection::connect(&args).await,
    }
}

async fn capture_pty(
    connected: &mut Connected,
    profile: &OsProfile,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, SessionError> {
    let channel = connected
        .pty
        .as_mut()
        .ok_or_else(|| SessionError::Other("PTY not opened for capture".to_string()))?;
    let pattern = prompt_pattern(profile)?;
    let pre_get_config = profile.pre_get_config().unwrap_or_default();
    capture::run(
        channel,
        &pattern,
        &pre_get_config,
        &profile.get_config,
        Duration::from_secs(profile.timeout),
        cancel,
    )
    .await
}

/// The non-interactive connector: a single exec channel carries `get_config`
/// and its output is returned verbatim, minus the echoed command line (SS4.E
/// phase 2, non-PTY mode). A PTY is still opened first when `pre_get_config`
/// is set, since paging-disable commands need an interactive shell.
pub struct Basic;

#[async_trait]
impl SshSessionOps for Basic {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        credential: &Credential,
        profile: &OsProfile,
        tunnel: Option<&SshConnection>,
        connect_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Connected, SessionError> {
        let conn = dial(host, port, credential, tunnel, connect_timeout, cancel).await?;
        let pty = if profile.pre_get_config().is_some() {
            Some(io_with_timeout("open pty", conn.open_pty(), connect_timeout, cancel).await?)
        } else {
            None
        };
        Ok(Connected { conn, pty })
    }

    async fn capture(
        &self,
        connected: &mut Connected,
        profile: &OsProfile,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, SessionError> {
        if connected.pty.is_some() {
            return capture_pty(connected, profile, cancel).await;
        }

        let timeout = Duration::from_secs(profile.timeout);
        let raw = connected.conn.exec(&profile.get_config, timeout, cancel).await?;
        Ok(trim_echoed_command(&raw, &profile.get_config))
    }
}

/// The interactive connector: after the PTY opens, waits for a literal
/// `User:` prompt and sends the username, then a literal `Password:` prompt
/// and sends the password, each bounded by 60s (SS4.E phase 1 variants).
pub struct PromptLogin;

#[async_trait]
impl SshSessionOps for PromptLogin {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        credential: &Credential,
        profile: &OsProfile,
        tunnel: Option<&SshConnection>,
        connect_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Connected, SessionError> {
        let conn = dial(host, port, credential, tunnel, connect_timeout, cancel).await?;
        let mut pty = io_with_timeout("open pty", conn.open_pty(), connect_timeout, cancel).await?;

        wait_for_literal(&mut pty, b"User:", Duration::from_secs(60), cancel).await?;
        write_line(&mut pty, &credential.username).await?;
        wait_for_literal(&mut pty, b"Password:", Duration::from_secs(60), cancel).await?;
        write_line(&mut pty, credential.password.expose()).await?;

        Ok(Connected {
            conn,
            pty: Some(pty),
        })
    }

    async fn capture(
        &self,
        connected: &mut Connected,
        profile: &OsProfile,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, SessionError> {
        capture_pty(connected, profile, cancel).await
    }
}

async fn write_line(channel: &mut Channel<Msg>, line: &str) -> Result<(), SessionError> {
    channel
        .data(format!("{line}\n").as_bytes())
        .await
        .map_err(|e| SessionError::ConnectionLost(e.to_string()))
}

async fn wait_for_literal(
    channel: &mut Channel<Msg>,
    needle: &[u8],
    budget: Duration,
    cancel: &CancellationToken,
) -> Result<(), SessionError> {
    io_with_timeout(
        "Timeout awaiting prompt",
        async {
            let mut buf = Vec::new();
            loop {
                if contains(&buf, needle) {
                    return Ok(());
                }
                match channel.wait().await {
                    Some(ChannelMsg::Data { data }) => buf.extend_from_slice(&data),
                    Some(ChannelMsg::ExtendedData { data, .. }) => buf.extend_from_slice(&data),
                    Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                        return Err(SessionError::ConnectionLost(
                            "channel closed before login prompt".to_string(),
                        ));
                    },
                    Some(_) => continue,
                }
            }
        },
        budget,
        cancel,
    )
    .await
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len().max(1)).any(|w| w == needle)
}

#[enum_dispatch(SshSessionOps)]
pub enum SessionVariant {
    Basic(Basic),
    PromptLogin(PromptLogin),
}

impl From<ConnectionVariant> for SessionVariant {
    fn from(variant: ConnectionVariant) -> Self {
        match variant {
            ConnectionVariant::Basic => SessionVariant::Basic(Basic),
            ConnectionVariant::PromptLogin => SessionVariant::PromptLogin(PromptLogin),
        }
    }
}

/// Inputs shared by `backup_host` and `test_login`: the resolved host,
/// its OS profile, the ordered credential list to try, and an optional
/// jump-host tunnel.
pub struct SessionArgs<'a> {
    pub host: &'a Host,
    pub profile: &'a OsProfile,
    pub credentials: &'a [Credential],
    pub tunnel: Option<&'a SshConnection>,
    pub admission: Arc<Semaphore>,
    pub connect_timeout: Duration,
    pub cancel: CancellationToken,
}

/// Phase 1: tries each credential in order, acquiring the admission
/// semaphore around each handshake. `PermissionDenied` is recoverable
/// (advances to the next credential); anything else is fatal for this host
/// (SS4.E phase 1, SS7 propagation policy).
async fn authenticate(args: &SessionArgs<'_>) -> Result<(Connected, String, usize), SessionError> {
    if args.credentials.is_empty() {
        return Err(SessionError::NoCredentials(args.host.name().to_string()));
    }

    let target = args.host.dial_target().unwrap_or_else(|| args.host.name());
    let variant = SessionVariant::from(args.profile.connection);

    let mut attempts = 0;
    for credential in args.credentials {
        attempts += 1;
        let _permit = args
            .admission
            .acquire()
            .await
            .map_err(|_| SessionError::Other("admission semaphore closed".to_string()))?;

        match variant
            .connect(
                target,
                22,
                credential,
                args.profile,
                args.tunnel,
                args.connect_timeout,
                &args.cancel,
            )
            .await
        {
            Ok(connected) => return Ok((connected, credential.username.clone(), attempts)),
            Err(SessionError::PermissionDenied) => {
                debug!(host = %args.host.name(), user = %credential.username, "credential rejected");
                continue;
            },
            Err(other) => return Err(other),
        }
    }

    Err(SessionError::AllCredentialsFailed { attempts })
}

/// The outcome of a phase-1-only trial: which credential (if any)
/// authenticated, and how many were attempted before it (or before giving
/// up).
pub struct LoginOutcome {
    pub username: Option<String>,
    pub attempts: usize,
}

/// Performs phase 1 only. Mirrors `netcfgbu login`'s semantics:
/// `username: None` means every credential was rejected; any other error is
/// fatal for this host.
pub async fn test_login(args: &SessionArgs<'_>) -> Result<LoginOutcome, SessionError> {
    match authenticate(args).await {
        Ok((connected, username, attempts)) => {
            connected.conn.close().await;
            Ok(LoginOutcome {
                username: Some(username),
                attempts,
            })
        },
        Err(SessionError::AllCredentialsFailed { attempts }) => Ok(LoginOutcome {
            username: None,
            attempts,
        }),
        Err(other) => Err(other),
    }
}

/// Runs phases 1-3: authenticate, capture the running configuration, lint
/// it, and write it atomically to `<configs_dir>/<host>.cfg`. Returns the
/// username that authenticated.
pub async fn backup_host(
    args: &SessionArgs<'_>,
    configs_dir: &Path,
    linter_spec: Option<&linter::LinterSpec>,
) -> Result<String, SessionError> {
    let variant = SessionVariant::from(args.profile.connection);
    let (mut connected, username, _attempts) = authenticate(args).await?;

    let captured = variant.capture(&mut connected, args.profile, &args.cancel).await;
    connected.conn.close().await;
    let captured = captured?;

    save_config(args.host.name(), &captured, configs_dir, linter_spec)
        .await
        .map_err(|e| SessionError::Other(e.to_string()))?;

    Ok(username)
}

/// Phase 3: decode (lossy), strip `\r`, lint, and write atomically via a
/// temp-sibling + rename, per SS4.E.
async fn save_config(
    host: &str,
    captured: &[u8],
    configs_dir: &Path,
    linter_spec: Option<&linter::LinterSpec>,
) -> Result<(), std::io::Error> {
    let text = String::from_utf8_lossy(captured).replace('\r', "");
    let text = match linter_spec {
        Some(spec) => {
            let linted = linter::lint_content(&text, spec);
            if linted == text {
                debug!(host, "linter produced no change");
            }
            linted
        },
        None => text,
    };

    let mut text = text;
    if !text.ends_with('\n') {
        text.push('\n');
    }

    let dest = configs_dir.join(format!("{host}.cfg"));
    let tmp = configs_dir.join(format!(".{host}.cfg.tmp"));
    fs::write(&tmp, text.as_bytes()).await?;
    fs::rename(&tmp, &dest).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_finds_substring() {
        assert!(contains(b"please enter User: now", b"User:"));
        assert!(!contains(b"please enter", b"User:"));
    }
}
