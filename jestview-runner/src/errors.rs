// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by jestview.

use camino::{Utf8Path, Utf8PathBuf};
use config::ConfigError;
use std::{error::Error, fmt};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse jestview config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8Path {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// An error that occurred while parsing a single line of runner output.
///
/// These errors are never fatal: the pipeline logs them and moves on to the next line.
#[derive(Debug, Error)]
pub enum ParseLineError {
    /// The line was not a JSON object with an `event` tag.
    #[error("line is not a valid runner event")]
    Json(#[source] serde_json::Error),

    /// The event tag was recognized, but its payload did not have the expected shape.
    #[error("invalid payload for `{event}` event")]
    Payload {
        /// The event tag.
        event: &'static str,

        /// The underlying error.
        #[source]
        err: serde_json::Error,
    },
}

/// An error that occurred while launching or tearing down the runner process.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The runner could not be spawned.
    #[error("failed to spawn `{command}`")]
    Spawn {
        /// The command line that failed to spawn.
        command: String,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// Waiting on the runner failed.
    #[error("failed to wait for `{command}`")]
    Wait {
        /// The command line being waited on.
        command: String,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// The bundled reporter could not be written out.
    #[error("failed to install bundled reporter at `{path}`")]
    InstallReporter {
        /// The path being written.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// The reader task for the watch process panicked or was cancelled.
    #[error("runner output task failed")]
    TaskJoin(#[source] tokio::task::JoinError),
}

/// Displays an error along with its chain of sources, one per line.
#[derive(Clone, Copy, Debug)]
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        if source.is_some() {
            write!(f, "\n  caused by:")?;
        }
        while let Some(err) = source {
            write!(f, "\n  - {err}")?;
            source = err.source();
        }

        Ok(())
    }
}
