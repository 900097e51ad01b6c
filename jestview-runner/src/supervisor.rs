// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Supervision of the runner process.
//!
//! Startup happens in two phases. A short-lived version probe runs to completion first, and only
//! then is the long-lived watch run spawned. The watch run's stdout is framed into lines and
//! forwarded over a channel by a reader task; the supervisor never interprets the lines itself.

mod lines;

use self::lines::{LineReader, next_line_opt};
use crate::{
    config::JestviewConfig, errors::SupervisorError, reporter::resolve_reporter,
    status::RunnerVersion,
};
use itertools::Itertools;
use std::{
    fmt,
    process::{ExitStatus, Stdio},
};
use tokio::{
    process::{Child, ChildStderr, ChildStdout, Command},
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

/// Something that happened to the watch run.
#[derive(Debug)]
pub enum SupervisorEvent {
    /// A complete line of standard output.
    Stdout(String),

    /// A complete line of standard error.
    Stderr(String),

    /// The watch run exited on its own. No further events follow.
    Exited(RunnerExit),
}

/// How the watch run ended.
#[derive(Debug)]
pub enum RunnerExit {
    /// The process exited with this status.
    Status(ExitStatus),

    /// Waiting on the process failed.
    WaitFailed(std::io::Error),
}

impl fmt::Display for RunnerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => match status.code() {
                Some(code) => write!(f, "exited with code {code}"),
                None => write!(f, "exited ({status})"),
            },
            Self::WaitFailed(err) => write!(f, "could not be waited on: {err}"),
        }
    }
}

/// Owns the watch run and the task reading its output.
///
/// Dropping a supervisor kills the watch run.
#[derive(Debug)]
pub struct Supervisor {
    command: String,
    version: RunnerVersion,
    kill_sender: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Supervisor {
    /// Probes the runner's version, then starts the watch run.
    ///
    /// A failed probe is not fatal. Failing to spawn the watch run is.
    pub async fn start(
        config: &JestviewConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SupervisorEvent>), SupervisorError> {
        let runner = config.runner();
        let version = probe_version(config).await;
        info!("runner version: {version}");

        let reporter = resolve_reporter(config.workspace_root(), runner.reporter.as_deref())?;

        let mut cmd = Command::new(&runner.program);
        cmd.args(&runner.watch_args)
            .arg("--reporters")
            .arg(&reporter)
            .current_dir(config.workspace_root())
            .env("CI", "true")
            .envs(&runner.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let command = display_command(
            runner.program.as_str(),
            runner
                .watch_args
                .iter()
                .map(String::as_str)
                .chain(["--reporters", reporter.as_str()]),
        );

        let mut child = cmd.spawn().map_err(|err| SupervisorError::Spawn {
            command: command.clone(),
            err,
        })?;
        info!("started `{command}` in {}", config.workspace_root());

        let stdout = child
            .stdout
            .take()
            .map(|stdout| LineReader::new("stdout", stdout));
        let stderr = child
            .stderr
            .take()
            .map(|stderr| LineReader::new("stderr", stderr));

        let (sender, receiver) = mpsc::unbounded_channel();
        let (kill_sender, kill_receiver) = oneshot::channel();
        let task = tokio::spawn(watch_child(
            child,
            stdout,
            stderr,
            kill_receiver,
            sender,
            command.clone(),
        ));

        Ok((
            Self {
                command,
                version,
                kill_sender: Some(kill_sender),
                task: Some(task),
            },
            receiver,
        ))
    }

    /// The version reported by the probe.
    pub fn version(&self) -> &RunnerVersion {
        &self.version
    }

    /// The watch run's command line.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Kills the watch run and waits for the reader task to finish.
    ///
    /// Once this returns, no further events are sent. Calling it twice is a no-op.
    pub async fn shutdown(&mut self) -> Result<(), SupervisorError> {
        if let Some(kill_sender) = self.kill_sender.take() {
            // The task may have already finished after the runner exited.
            _ = kill_sender.send(());
        }
        if let Some(task) = self.task.take() {
            task.await.map_err(SupervisorError::TaskJoin)?;
            debug!("shut down `{}`", self.command);
        }
        Ok(())
    }

    /// Shuts down and starts again, returning the new event receiver.
    pub async fn restart(
        &mut self,
        config: &JestviewConfig,
    ) -> Result<mpsc::UnboundedReceiver<SupervisorEvent>, SupervisorError> {
        self.shutdown().await?;
        let (supervisor, receiver) = Self::start(config).await?;
        *self = supervisor;
        Ok(receiver)
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        // Dropping the child inside the task kills it.
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

async fn probe_version(config: &JestviewConfig) -> RunnerVersion {
    let runner = config.runner();
    let command = display_command(
        runner.program.as_str(),
        runner.version_args.iter().map(String::as_str),
    );
    debug!("probing runner version with `{command}`");

    let output = Command::new(&runner.program)
        .args(&runner.version_args)
        .current_dir(config.workspace_root())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Ok(output) => {
            if !output.status.success() {
                warn!("`{command}` {}", RunnerExit::Status(output.status));
            }
            RunnerVersion::from_probe_output(&String::from_utf8_lossy(&output.stdout))
        }
        Err(err) => {
            warn!("failed to run `{command}`: {err}");
            RunnerVersion::Unknown
        }
    }
}

async fn watch_child(
    mut child: Child,
    mut stdout: Option<LineReader<ChildStdout>>,
    mut stderr: Option<LineReader<ChildStderr>>,
    mut kill_receiver: oneshot::Receiver<()>,
    sender: mpsc::UnboundedSender<SupervisorEvent>,
    command: String,
) {
    while stdout.is_some() || stderr.is_some() {
        tokio::select! {
            // A dropped sender means the supervisor is gone, which also means kill.
            _ = &mut kill_receiver => {
                kill(&mut child, &command).await;
                return;
            }
            res = next_line_opt(stdout.as_mut()), if stdout.is_some() => match res {
                Ok(Some(line)) => {
                    debug!(target: "jestview_runner::stdout", "{line}");
                    _ = sender.send(SupervisorEvent::Stdout(line));
                }
                Ok(None) => stdout = None,
                Err(err) => {
                    warn!("error reading stdout of `{command}`: {err}");
                    stdout = None;
                }
            },
            res = next_line_opt(stderr.as_mut()), if stderr.is_some() => match res {
                Ok(Some(line)) => {
                    debug!(target: "jestview_runner::stderr", "{line}");
                    _ = sender.send(SupervisorEvent::Stderr(line));
                }
                Ok(None) => stderr = None,
                Err(err) => {
                    warn!("error reading stderr of `{command}`: {err}");
                    stderr = None;
                }
            },
        }
    }

    let exit = tokio::select! {
        _ = &mut kill_receiver => {
            kill(&mut child, &command).await;
            return;
        }
        res = child.wait() => match res {
            Ok(status) => RunnerExit::Status(status),
            Err(err) => RunnerExit::WaitFailed(err),
        },
    };
    info!("`{command}` {exit}");
    _ = sender.send(SupervisorEvent::Exited(exit));
}

async fn kill(child: &mut Child, command: &str) {
    debug!("killing `{command}`");
    if let Err(err) = child.kill().await {
        warn!("failed to kill `{command}`: {err}");
    }
}

fn display_command<'a>(program: &'a str, args: impl IntoIterator<Item = &'a str>) -> String {
    std::iter::once(program).chain(args).join(" ")
}
