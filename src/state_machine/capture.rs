// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The PTY capture phases (prompt wait -> paging disable -> get-config).
//!
//! Built on `state_machine::common::{StateMachine, Transition}`: each phase
//! is a zero-sized state struct implementing [`StateMachine`], driven by a
//! small `execute`-style loop over a fixed enum of capture phases.

use std::{pin::Pin, time::Duration};

use russh::{Channel, ChannelMsg, client::Msg};
use tokio_util::sync::CancellationToken;

use crate::{
    client::common::io_with_timeout,
    error::SessionError,
    ssh::prompt::PromptPattern,
    state_machine::common::{StateMachine, Transition, trim_echoed_command},
};

/// Everything a capture step needs: the PTY channel, the compiled prompt,
/// the commands to run, and the token an external cancel (SIGINT) signals
/// through.
pub struct CaptureCtx<'a> {
    channel: &'a mut Channel<Msg>,
    prompt: &'a PromptPattern,
    cancel: &'a CancellationToken,
    buf: Vec<u8>,
}

impl<'a> CaptureCtx<'a> {
    pub fn new(channel: &'a mut Channel<Msg>, prompt: &'a PromptPattern, cancel: &'a CancellationToken) -> Self {
        Self {
            channel,
            prompt,
            cancel,
            buf: Vec::new(),
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<(), SessionError> {
        self.channel
            .data(format!("{line}\n").as_bytes())
            .await
            .map_err(|e| SessionError::ConnectionLost(e.to_string()))
    }

    /// Reads channel data into `self.buf` until the prompt matches the tail
    /// of accumulated output. Returns the captured bytes up to (not
    /// including) the final newline before the prompt.
    async fn read_until_prompt_once(&mut self) -> Result<Vec<u8>, SessionError> {
        loop {
            if let Some((_, nl_at)) = self.prompt.match_tail(&self.buf) {
                let out = self.buf[..nl_at].to_vec();
                self.buf.clear();
                return Ok(out);
            }
            match self.channel.wait().await {
                Some(ChannelMsg::Data { data }) => self.buf.extend_from_slice(&data),
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    self.buf.extend_from_slice(&data)
                },
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    return Err(SessionError::ConnectionLost(
                        "channel closed before prompt".to_string(),
                    ));
                },
                Some(_) => continue,
            }
        }
    }

    async fn read_until_prompt(
        &mut self,
        budget: Duration,
        timeout_label: &'static str,
    ) -> Result<Vec<u8>, SessionError> {
        let cancel = self.cancel;
        io_with_timeout(timeout_label, self.read_until_prompt_once(), budget, cancel).await
    }
}

type StepOut = Transition<(), Result<Vec<u8>, SessionError>>;

/// Phase 1: read until the device prints its initial prompt, bounded to 15s
/// per SS4.E.
pub struct AwaitPrompt;

impl StateMachine<CaptureCtx<'_>, StepOut> for AwaitPrompt {
    type StepResult<'a>
        = Pin<Box<dyn Future<Output = StepOut> + Send + 'a>>
    where
        Self: 'a,
        CaptureCtx<'static>: 'a;

    fn step<'a>(&'a mut self, ctx: &'a mut CaptureCtx<'_>) -> Self::StepResult<'a> {
        Box::pin(async move {
            match ctx
                .read_until_prompt(Duration::from_secs(15), "Timeout awaiting prompt")
                .await
            {
                Ok(_) => Transition::Done(Ok(Vec::new())),
                Err(e) => Transition::Done(Err(e)),
            }
        })
    }
}

/// Phase 2: write one paging-disable command and wait for the prompt again.
pub struct PreCommand<'c>(pub &'c str);

impl StateMachine<CaptureCtx<'_>, StepOut> for PreCommand<'_> {
    type StepResult<'a>
        = Pin<Box<dyn Future<Output = StepOut> + Send + 'a>>
    where
        Self: 'a,
        CaptureCtx<'static>: 'a;

    fn step<'a>(&'a mut self, ctx: &'a mut CaptureCtx<'_>) -> Self::StepResult<'a> {
        let cmd = self.0.to_string();
        Box::pin(async move {
            if let Err(e) = ctx.write_line(&cmd).await {
                return Transition::Done(Err(e));
            }
            match ctx
                .read_until_prompt(
                    Duration::from_secs(u64::MAX / 2),
                    "Timeout executing pre-get-running commands",
                )
                .await
            {
                Ok(_) => Transition::Done(Ok(Vec::new())),
                Err(e) => Transition::Done(Err(e)),
            }
        })
    }
}

/// Phase 3: write `get_config` and capture everything up to the next
/// prompt, stripping the echoed command line the device writes back before
/// its own output (SS4.E phase 2 PTY mode: "captured config is the output
/// between the echoed command and the trailing prompt").
pub struct GetConfig<'c>(pub &'c str);

impl StateMachine<CaptureCtx<'_>, StepOut> for GetConfig<'_> {
    type StepResult<'a>
        = Pin<Box<dyn Future<Output = StepOut> + Send + 'a>>
    where
        Self: 'a,
        CaptureCtx<'static>: 'a;

    fn step<'a>(&'a mut self, ctx: &'a mut CaptureCtx<'_>) -> Self::StepResult<'a> {
        let cmd = self.0.to_string();
        Box::pin(async move {
            if let Err(e) = ctx.write_line(&cmd).await {
                return Transition::Done(Err(e));
            }
            match ctx
                .read_until_prompt(
                    Duration::from_secs(u64::MAX / 2),
                    "Timeout getting running configuration",
                )
                .await
            {
                Ok(captured) => Transition::Done(Ok(trim_echoed_command(&captured, &cmd))),
                Err(e) => Transition::Done(Err(e)),
            }
        })
    }
}

/// Drives the three capture phases in strict order, enforcing `timeout` as
/// the aggregate budget for phase 2 (all paging commands together) and
/// again for phase 3, independently, per SS4.E.
pub async fn run(
    channel: &mut Channel<Msg>,
    prompt: &PromptPattern,
    pre_get_config: &[String],
    get_config: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, SessionError> {
    let mut ctx = CaptureCtx::new(channel, prompt, cancel);

    step_done(AwaitPrompt.step(&mut ctx)).await?;

    tokio::time::timeout(timeout, async {
        for cmd in pre_get_config {
            step_done(PreCommand(cmd).step(&mut ctx)).await?;
        }
        Ok::<_, SessionError>(())
    })
    .await
    .map_err(|_| SessionError::Timeout("Timeout executing pre-get-running commands".to_string()))??;

    let captured = tokio::time::timeout(timeout, step_done(GetConfig(get_config).step(&mut ctx)))
        .await
        .map_err(|_| SessionError::Timeout("Timeout getting running configuration".to_string()))??;

    Ok(captured)
}

async fn step_done(
    fut: Pin<Box<dyn Future<Output = StepOut> + Send + '_>>,
) -> Result<Vec<u8>, SessionError> {
    match fut.await {
        Transition::Done(r) => r,
        Transition::Next((), _) | Transition::Stay(_) => unreachable!(
            "capture phases always resolve in a single step via Transition::Done"
        ),
    }
}
