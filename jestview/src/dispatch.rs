// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    errors::Result,
    input::{HELP, read_commands},
    output::{OutputContext, OutputOpts, clap_styles},
    view::{PrintWorkspace, TerminalView, ThemeCharacters, ViewStyles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use jestview_runner::{
    config::JestviewConfig,
    coordinator::{Coordinator, CoordinatorCommand},
    status::RunnerFailure,
    tree::DisplayContext,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Watch a Jest run and show its results as a tree.
///
/// jestview starts Jest in watch mode with a reporter that streams results back, and redraws the
/// tree every time a test file starts or finishes. Type `r` to restart the runner, `o <row>...`
/// to print the locations of rows, and `q` to quit.
#[derive(Debug, Parser)]
#[command(version, bin_name = "jestview", styles = clap_styles::style(), max_term_width = 100)]
pub struct JestviewApp {
    /// Workspace root to run Jest in [default: current directory]
    #[arg(long, short = 'w', value_name = "DIR", global = true)]
    workspace: Option<Utf8PathBuf>,

    /// Config file [default: workspace-root/.config/jestview.toml]
    #[arg(long, value_name = "PATH", global = true)]
    config_file: Option<Utf8PathBuf>,

    /// Override the configured runner program
    #[arg(long, value_name = "PROGRAM", env = "JESTVIEW_RUNNER")]
    runner: Option<Utf8PathBuf>,

    /// Override the configured reporter module
    #[arg(long, value_name = "PATH")]
    reporter: Option<Utf8PathBuf>,

    #[clap(flatten)]
    output: OutputOpts,
}

impl JestviewApp {
    /// Executes the app.
    ///
    /// Returns the exit code for the process.
    pub fn exec(self) -> Result<i32> {
        let output = self.output.init();

        let workspace_root = self.workspace_root()?;
        let mut config =
            JestviewConfig::from_sources(&workspace_root, self.config_file.as_deref())?;
        if let Some(program) = &self.runner {
            config.set_program(program);
        }
        if let Some(reporter) = &self.reporter {
            config.set_reporter(reporter);
        }
        debug!("runner config: {:?}", config.runner());

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|err| ExpectedError::RuntimeCreateError { err })?;

        let result = runtime.block_on(watch(config, output));
        // Stdin reads block a runtime thread, so don't wait for them.
        runtime.shutdown_background();
        result
    }

    fn workspace_root(&self) -> Result<Utf8PathBuf> {
        let root = match &self.workspace {
            Some(root) => root.clone(),
            None => {
                let current_dir = std::env::current_dir()
                    .map_err(|err| ExpectedError::CurrentDirFailed { err })?;
                Utf8PathBuf::try_from(current_dir)
                    .map_err(|err| ExpectedError::WorkspaceRootInvalidUtf8 { err })?
            }
        };
        if !root.is_dir() {
            return Err(ExpectedError::WorkspaceRootInvalid { path: root });
        }
        Ok(root)
    }
}

async fn watch(config: JestviewConfig, output: OutputContext) -> Result<i32> {
    let mut styles = ViewStyles::default();
    if output.color.should_colorize(supports_color::Stream::Stdout) {
        styles.colorize();
    }
    let mut theme = ThemeCharacters::default();
    if supports_unicode::on(supports_unicode::Stream::Stdout) {
        theme.use_unicode();
    }
    let cx = DisplayContext::new(config.workspace_root(), home_dir());

    let view = TerminalView::new(std::io::stdout(), cx, styles, theme, output.verbose);
    let rows = view.rows();

    let (sender, receiver) = mpsc::unbounded_channel();
    tokio::spawn(read_commands(rows, sender.clone()));
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                debug!("received Ctrl-C, shutting down");
                _ = sender.send(CoordinatorCommand::Shutdown);
            }
            Err(err) => warn!("unable to listen for Ctrl-C: {err}"),
        }
    });

    info!("{HELP}");
    let mut coordinator = Coordinator::new(config, view, PrintWorkspace);
    coordinator.run(receiver).await;

    let mut view = coordinator.into_view();
    if let Some(err) = view.take_write_error() {
        return Err(ExpectedError::WriteOutputError { err });
    }
    match view.last_failure() {
        Some(RunnerFailure::StartFailed(message)) => Err(ExpectedError::RunnerStartFailed {
            message: message.clone(),
        }),
        Some(failure @ RunnerFailure::Exited(_)) => Err(ExpectedError::RunnerExited {
            message: failure.to_string(),
        }),
        None => Ok(0),
    }
}

fn home_dir() -> Option<Utf8PathBuf> {
    let home = std::env::var("HOME").ok()?;
    let home = Utf8Path::new(&home);
    home.is_absolute().then(|| home.to_owned())
}
