// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use jestview_metadata::JestviewExitCode;
use jestview_runner::errors::ConfigParseError;
use owo_colors::{OwoColorize, Stream};
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// An error that is reported with a documented exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDirFailed {
        #[source]
        err: std::io::Error,
    },

    #[error("workspace root is not valid UTF-8")]
    WorkspaceRootInvalidUtf8 {
        #[source]
        err: camino::FromPathBufError,
    },

    #[error("workspace root `{path}` is not a directory")]
    WorkspaceRootInvalid { path: Utf8PathBuf },

    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },

    #[error("failed to create the async runtime")]
    RuntimeCreateError {
        #[source]
        err: std::io::Error,
    },

    #[error("runner could not be started")]
    RunnerStartFailed { message: String },

    #[error("runner exited")]
    RunnerExited { message: String },

    #[error("error writing output")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::WorkspaceRootInvalidUtf8 { .. }
            | Self::WorkspaceRootInvalid { .. }
            | Self::ConfigParseError { .. }
            | Self::RuntimeCreateError { .. } => JestviewExitCode::SETUP_ERROR,
            Self::RunnerStartFailed { .. } => JestviewExitCode::RUNNER_SPAWN_FAILED,
            Self::RunnerExited { .. } => JestviewExitCode::RUNNER_EXITED,
            Self::WriteOutputError { .. } => JestviewExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self) {
        let mut next_error = match self {
            Self::CurrentDirFailed { err } => {
                error!("could not determine the current directory");
                Some(err as &dyn Error)
            }
            Self::WorkspaceRootInvalidUtf8 { err } => {
                error!("workspace root is not valid UTF-8");
                Some(err as &dyn Error)
            }
            Self::WorkspaceRootInvalid { path } => {
                error!(
                    "workspace root `{}` is not a directory",
                    path.if_supports_color(Stream::Stderr, |x| x.bold())
                );
                None
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse jestview config at `{}`",
                    err.config_file()
                        .if_supports_color(Stream::Stderr, |x| x.bold())
                );
                Some(err.kind() as &dyn Error)
            }
            Self::RuntimeCreateError { err } => {
                error!("failed to create the async runtime");
                Some(err as &dyn Error)
            }
            Self::RunnerStartFailed { message } => {
                error!("runner could not be started: {message}");
                None
            }
            Self::RunnerExited { message } => {
                error!("{message}");
                None
            }
            Self::WriteOutputError { err } => {
                error!("error writing output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: "jestview::no_heading", "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(
        ExpectedError::RunnerStartFailed { message: "no such file".to_owned() },
        JestviewExitCode::RUNNER_SPAWN_FAILED;
        "start failed"
    )]
    #[test_case(
        ExpectedError::RunnerExited { message: "runner exited with code 1".to_owned() },
        JestviewExitCode::RUNNER_EXITED;
        "exited"
    )]
    #[test_case(
        ExpectedError::WorkspaceRootInvalid { path: "/nope".into() },
        JestviewExitCode::SETUP_ERROR;
        "bad workspace"
    )]
    fn exit_codes(error: ExpectedError, expected: i32) {
        assert_eq!(error.process_exit_code(), expected);
    }
}
