// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A single SSH connection, optionally tunneled through a jump host.
//!
//! Grounded on `client::client::ClientConnection`'s shape (a thin owner of a
//! transport handle plus the knobs every caller needs), generalized from a
//! raw `TcpStream` split pair to a `russh::client::Handle`. `known_hosts` is
//! intentionally not checked (SS4.E: `known_hosts: none` is the only default),
//! mirroring the original connector's `known_hosts=None` behavior.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use russh::{
    Channel, ChannelMsg, Disconnect, Preferred,
    client::{self, Config, Handle, Msg},
    keys::PublicKey,
};
use tokio::net::lookup_host;
use tokio_util::sync::CancellationToken;

use crate::{client::common::io_with_timeout, credentials::Credential, error::SessionError};

/// Accepts any host key: this crate never maintains a `known_hosts` file,
/// matching `netcfgbu`'s connectors (`known_hosts=None` is the only mode the
/// original supports).
struct AcceptAnyHostKey;

impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(&mut self, _key: &PublicKey) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Everything a session needs to dial a device: address, auth, the
/// transport-level timeout that bounds the handshake, and the token that
/// lets an external cancel (e.g. SIGINT) interrupt it mid-wait.
pub struct ConnectArgs<'a> {
    pub host: &'a str,
    pub port: u16,
    pub credential: &'a Credential,
    pub connect_timeout: Duration,
    pub cancel: &'a CancellationToken,
}

/// One live SSH transport: either a direct connection or one tunneled
/// through a jump host's `direct-tcpip` channel.
pub struct SshConnection {
    handle: Handle<AcceptAnyHostKey>,
}

impl SshConnection {
    /// Connects directly over TCP and authenticates with `credential`. Per
    /// SS4.E's phase 1 pseudocode (`conn = ssh_connect(args ∪ cred) with
    /// timeout = os_profile.timeout`), both the transport handshake and the
    /// password exchange share one timeout-and-cancel budget.
    pub async fn connect(args: &ConnectArgs<'_>) -> Result<Self, SessionError> {
        io_with_timeout(
            "ssh connect",
            async {
                let addr = resolve(args.host, args.port).await?;
                let config = Arc::new(ssh_config());
                let handle = client::connect(config, addr, AcceptAnyHostKey)
                    .await
                    .map_err(classify_connect_err)?;
                Self::authenticate(handle, args.credential).await
            },
            args.connect_timeout,
            args.cancel,
        )
        .await
    }

    /// Connects through an already-open jump-host tunnel by opening a
    /// `direct-tcpip` channel on it and running the SSH handshake over that
    /// channel instead of a fresh TCP socket.
    pub async fn connect_via_tunnel(
        tunnel: &SshConnection,
        args: &ConnectArgs<'_>,
    ) -> Result<Self, SessionError> {
        io_with_timeout(
            "ssh connect via tunnel",
            async {
                let channel = tunnel
                    .handle
                    .channel_open_direct_tcpip(args.host, u32::from(args.port), "127.0.0.1", 0)
                    .await
                    .map_err(|e| SessionError::JumpHostDown(e.to_string()))?;

                let config = Arc::new(ssh_config());
                let stream = channel.into_stream();
                let handle = client::connect_stream(config, stream, AcceptAnyHostKey)
                    .await
                    .map_err(classify_connect_err)?;
                Self::authenticate(handle, args.credential).await
            },
            args.connect_timeout,
            args.cancel,
        )
        .await
    }

    /// Dials `target` (`[user@]host[:port]`) for use as a jump-host tunnel
    /// itself. The jump-host spec's own credential comes from the fleet
    /// credential chain, same as any other device. Jump-host tunnels are
    /// opened once up front (SS4.C), before any per-host cancellation scope
    /// exists, so this uses a standalone token that is never cancelled.
    pub async fn dial(target: &str) -> Result<Self, SessionError> {
        let (user, host, port) = parse_target(target);
        let credential = Credential {
            username: user,
            password: crate::credentials::Secret::new(String::new()),
        };
        let cancel = CancellationToken::new();
        Self::connect(&ConnectArgs {
            host: &host,
            port,
            credential: &credential,
            connect_timeout: Duration::from_secs(crate::cfg::enums::DEFAULT_LOGIN_TIMEOUT),
            cancel: &cancel,
        })
        .await
    }

    async fn authenticate(
        handle: Handle<AcceptAnyHostKey>,
        credential: &Credential,
    ) -> Result<Self, SessionError> {
        let mut handle = handle;
        let outcome = handle
            .authenticate_password(&credential.username, credential.password.expose())
            .await
            .map_err(|e| SessionError::Other(e.to_string()))?;

        if !outcome.success() {
            return Err(SessionError::PermissionDenied);
        }

        Ok(Self { handle })
    }

    /// Opens a non-interactive exec channel, runs `command`, and returns its
    /// combined stdout once the channel reports EOF/closed.
    pub async fn exec(
        &self,
        command: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, SessionError> {
        io_with_timeout(
            "exec",
            async {
                let mut channel = self
                    .handle
                    .channel_open_session()
                    .await
                    .map_err(|e| SessionError::Other(e.to_string()))?;

                channel
                    .exec(true, command)
                    .await
                    .map_err(|e| SessionError::Other(e.to_string()))?;

                let mut out = Vec::new();
                drain_exec(&mut channel, &mut out).await?;
                Ok(out)
            },
            timeout,
            cancel,
        )
        .await
    }

    /// Opens an interactive PTY channel (`vt100`, 80x24) for the multi-phase
    /// capture state machine.
    pub async fn open_pty(&self) -> Result<Channel<Msg>, SessionError> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| SessionError::Other(e.to_string()))?;

        channel
            .request_pty(false, "vt100", 80, 24, 0, 0, &[])
            .await
            .map_err(|e| SessionError::Other(e.to_string()))?;
        channel
            .request_shell(false)
            .await
            .map_err(|e| SessionError::Other(e.to_string()))?;

        Ok(channel)
    }

    pub async fn close(&self) {
        let _ = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await;
    }
}

async fn drain_exec(channel: &mut Channel<Msg>, out: &mut Vec<u8>) -> Result<(), SessionError> {
    loop {
        match channel.wait().await {
            Some(ChannelMsg::Data { data }) => out.extend_from_slice(&data),
            Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) => return Ok(()),
            Some(ChannelMsg::ExitStatus { .. }) => continue,
            Some(_) => continue,
            None => return Ok(()),
        }
    }
}

fn ssh_config() -> Config {
    Config {
        preferred: Preferred::default(),
        ..Config::default()
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, SessionError> {
    lookup_host((host, port))
        .await
        .map_err(|_| SessionError::NameResolutionError(host.to_string()))?
        .next()
        .ok_or_else(|| SessionError::NameResolutionError(host.to_string()))
}

fn classify_connect_err(err: russh::Error) -> SessionError {
    match err {
        russh::Error::IO(io_err) => SessionError::from_io(io_err),
        other => SessionError::ConnectionLost(other.to_string()),
    }
}

/// Parses a jump-host `[user@]host[:port]` spec the way the fleet's
/// `proxy` field is documented.
fn parse_target(target: &str) -> (String, String, u16) {
    let (user, rest) = match target.split_once('@') {
        Some((u, r)) => (u.to_string(), r),
        None => (String::new(), target),
    };
    match rest.rsplit_once(':') {
        Some((h, p)) => (user, h.to_string(), p.parse().unwrap_or(22)),
        None => (user, rest.to_string(), 22),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_target_splits_user_host_port() {
        assert_eq!(
            parse_target("admin@jump1.example.com:2222"),
            ("admin".to_string(), "jump1.example.com".to_string(), 2222)
        );
    }

    #[test]
    fn parse_target_defaults_port_22() {
        assert_eq!(
            parse_target("jump1.example.com"),
            (String::new(), "jump1.example.com".to_string(), 22)
        );
    }
}
