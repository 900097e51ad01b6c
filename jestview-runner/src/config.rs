// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for jestview.
//!
//! The configuration is layered: the default config embedded in this crate comes first, then
//! `.config/jestview.toml` in the workspace root (or a file passed in explicitly).

use crate::errors::{ConfigParseError, ConfigParseErrorKind};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Overall configuration for jestview.
#[derive(Clone, Debug)]
pub struct JestviewConfig {
    workspace_root: Utf8PathBuf,
    runner: RunnerConfig,
    prune: PruneMode,
}

impl JestviewConfig {
    /// The default location of the config within the workspace: `.config/jestview.toml`.
    pub const CONFIG_PATH: &'static str = ".config/jestview.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the jestview config from the given file, or if not specified from
    /// `.config/jestview.toml` in the workspace root.
    ///
    /// If no config file is specified and the workspace doesn't have `.config/jestview.toml`, uses
    /// the default config options. Unknown keys are reported as warnings.
    pub fn from_sources(
        workspace_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        Self::from_sources_impl(workspace_root, config_file, |config_file, unknown| {
            let mut unknown_str = String::new();
            if unknown.len() == 1 {
                // Print this on the same line.
                unknown_str.push(' ');
                unknown_str.push_str(unknown.iter().next().expect("length is 1"));
            } else {
                for ignored_key in unknown {
                    unknown_str.push_str("\n  - ");
                    unknown_str.push_str(ignored_key);
                }
            }

            warn!("ignoring unknown configuration keys in config file {config_file}:{unknown_str}")
        })
    }

    // A custom unknown_callback can be passed in while testing.
    fn from_sources_impl(
        workspace_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
        mut unknown_callback: impl FnMut(&Utf8Path, &BTreeSet<String>),
    ) -> Result<Self, ConfigParseError> {
        let workspace_root = workspace_root.into();

        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = workspace_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (deserialized, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        if !unknown.is_empty() {
            unknown_callback(&config_file, &unknown);
        }

        Ok(deserialized.into_config(workspace_root))
    }

    /// Returns the default jestview config.
    pub fn default_config(workspace_root: impl Into<Utf8PathBuf>) -> Self {
        let (deserialized, unknown) = Self::build_and_deserialize_config(
            &Self::make_default_config(),
        )
        .unwrap_or_else(|err| panic!("default config is always valid: {err}"));

        // The default config is embedded in this binary, so it must not contain unknown keys.
        assert!(
            unknown.is_empty(),
            "found unknown keys in default config: {unknown:?}"
        );

        deserialized.into_config(workspace_root.into())
    }

    /// Returns the workspace root: the working directory for the watch run.
    pub fn workspace_root(&self) -> &Utf8Path {
        &self.workspace_root
    }

    /// Returns the runner configuration.
    pub fn runner(&self) -> &RunnerConfig {
        &self.runner
    }

    /// Returns the suite pruning mode.
    pub fn prune(&self) -> PruneMode {
        self.prune
    }

    /// Overrides the runner program, for example from the command line.
    pub fn set_program(&mut self, program: &Utf8Path) {
        self.runner.program = resolve_program(&self.workspace_root, program);
    }

    /// Overrides the reporter module.
    pub fn set_reporter(&mut self, reporter: &Utf8Path) {
        self.runner.reporter = Some(self.workspace_root.join(reporter));
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(JestviewConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: JestviewConfigDeserialize = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| {
                // Both serde_path_to_error and the config crate report the key. Drop the key from
                // the config error for consistency.
                let path = error.path().clone();
                let config_error = error.into_inner();
                let error = match config_error {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

/// How to launch the runner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunnerConfig {
    /// The runner binary.
    pub program: Utf8PathBuf,

    /// Arguments for the version probe.
    pub version_args: Vec<String>,

    /// Arguments for the watch run, not including the reporter.
    pub watch_args: Vec<String>,

    /// The reporter module, or `None` to use the bundled reporter.
    pub reporter: Option<Utf8PathBuf>,

    /// Environment overrides for the watch run.
    pub env: BTreeMap<String, String>,
}

/// When suites whose backing file has disappeared are removed from the result tree.
#[derive(Copy, Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum PruneMode {
    /// Suites are kept for as long as the runner is alive.
    #[default]
    Never,

    /// Suites are checked against the filesystem each time a watch iteration completes.
    OnRunComplete,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct JestviewConfigDeserialize {
    runner: RunnerConfigDeserialize,
    tree: TreeConfigDeserialize,
}

impl JestviewConfigDeserialize {
    fn into_config(self, workspace_root: Utf8PathBuf) -> JestviewConfig {
        let RunnerConfigDeserialize {
            program,
            version_args,
            watch_args,
            reporter,
            env,
        } = self.runner;
        let runner = RunnerConfig {
            program: resolve_program(&workspace_root, &program),
            version_args,
            watch_args,
            reporter: reporter.map(|reporter| workspace_root.join(reporter)),
            env,
        };
        JestviewConfig {
            workspace_root,
            runner,
            prune: self.tree.prune,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RunnerConfigDeserialize {
    program: Utf8PathBuf,
    version_args: Vec<String>,
    watch_args: Vec<String>,
    #[serde(default)]
    reporter: Option<Utf8PathBuf>,
    #[serde(default)]
    env: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TreeConfigDeserialize {
    prune: PruneMode,
}

/// Bare program names are looked up on `PATH`; anything with a separator is relative to the
/// workspace root.
fn resolve_program(workspace_root: &Utf8Path, program: &Utf8Path) -> Utf8PathBuf {
    if program.is_relative() && program.components().count() > 1 {
        workspace_root.join(program)
    } else {
        program.to_owned()
    }
}
