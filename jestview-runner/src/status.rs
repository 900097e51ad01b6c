// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runner status, as shown to the user.

use std::fmt;

/// The version reported by the runner's version probe.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum RunnerVersion {
    /// The first non-empty line the probe printed.
    Known(String),

    /// The probe failed or printed nothing.
    #[default]
    Unknown,
}

impl RunnerVersion {
    /// Builds a version from the probe's standard output.
    pub fn from_probe_output(stdout: &str) -> Self {
        stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map_or(Self::Unknown, |line| Self::Known(line.to_owned()))
    }
}

impl fmt::Display for RunnerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(version) => f.write_str(version),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Why the runner is in an error state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RunnerFailure {
    /// The watch run couldn't be started.
    StartFailed(String),

    /// The watch run stopped without being asked to.
    Exited(String),
}

impl RunnerFailure {
    /// The failure message.
    pub fn message(&self) -> &str {
        match self {
            Self::StartFailed(message) | Self::Exited(message) => message,
        }
    }
}

impl fmt::Display for RunnerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// The lifecycle state of the runner.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum RunnerStatus {
    /// Nothing has been started.
    #[default]
    Inactive,

    /// The version probe is running.
    Starting,

    /// The watch run is active.
    Running,

    /// The runner couldn't be started or exited on its own.
    Error(RunnerFailure),
}

impl RunnerStatus {
    /// A short label for the status.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Error(_) => "error",
        }
    }

    /// Returns true if the runner is in an error state.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(failure) => write!(f, "error: {failure}"),
            other => f.write_str(other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("29.7.0\n", RunnerVersion::Known("29.7.0".to_owned()); "simple")]
    #[test_case("\n  \n v30.0.0-alpha \r\nextra\n", RunnerVersion::Known("v30.0.0-alpha".to_owned()); "leading blanks")]
    #[test_case("", RunnerVersion::Unknown; "empty")]
    #[test_case(" \n\n", RunnerVersion::Unknown; "whitespace only")]
    fn probe_output(stdout: &str, expected: RunnerVersion) {
        assert_eq!(RunnerVersion::from_probe_output(stdout), expected);
    }

    #[test]
    fn status_display() {
        assert_eq!(RunnerStatus::Running.to_string(), "running");
        assert_eq!(
            RunnerStatus::Error(RunnerFailure::Exited("runner exited with code 1".to_owned()))
                .to_string(),
            "error: runner exited with code 1"
        );
        assert!(RunnerStatus::Error(RunnerFailure::StartFailed(String::new())).is_error());
        assert_eq!(RunnerVersion::Unknown.to_string(), "unknown");
    }
}
