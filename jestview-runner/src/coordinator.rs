// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wires the supervisor, the event parser, the result tree and the issue index together.
//!
//! [`Pipeline`] is the synchronous core: it turns one line of runner output into at most one
//! [`Refresh`]. [`Coordinator`] owns a pipeline and a [`Supervisor`], and drives both from a
//! single task so that no two mutations ever interleave.

use crate::{
    config::{JestviewConfig, PruneMode},
    errors::{DisplayErrorChain, SupervisorError},
    event::{IgnoredLine, ParsedLine, RunnerEvent, parse_line},
    helpers::plural,
    issues::IssueIndex,
    open::{OpenSummary, Workspace, open_selection},
    stack::{NodeStackResolver, StackTraceResolver},
    status::{RunnerFailure, RunnerStatus, RunnerVersion},
    supervisor::{Supervisor, SupervisorEvent},
    tree::{Refresh, ResultTree, TreeNode},
};
use camino::Utf8Path;
use debug_ignore::DebugIgnore;
use jestview_metadata::AggregatedSummary;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

type SuiteExists = Arc<dyn Fn(&Utf8Path) -> bool + Send + Sync>;

/// Turns runner output lines into state changes.
#[derive(Debug)]
pub struct Pipeline {
    tree: ResultTree,
    issues: IssueIndex,
    resolver: Arc<dyn StackTraceResolver>,
    prune: PruneMode,
    suite_exists: DebugIgnore<SuiteExists>,
}

impl Pipeline {
    /// Creates an empty pipeline.
    pub fn new(prune: PruneMode, resolver: Arc<dyn StackTraceResolver>) -> Self {
        let suite_exists: SuiteExists = Arc::new(|path: &Utf8Path| path.exists());
        Self {
            tree: ResultTree::new(),
            issues: IssueIndex::new(),
            resolver,
            prune,
            suite_exists: DebugIgnore(suite_exists),
        }
    }

    /// Replaces the check used to decide whether a suite's file still exists when pruning.
    pub fn with_suite_exists(
        mut self,
        suite_exists: impl Fn(&Utf8Path) -> bool + Send + Sync + 'static,
    ) -> Self {
        let suite_exists: SuiteExists = Arc::new(suite_exists);
        self.suite_exists = DebugIgnore(suite_exists);
        self
    }

    /// Handles one line of runner output.
    ///
    /// Lines that can't be parsed are logged and skipped.
    pub fn handle_line(&mut self, line: &str) -> Option<Refresh> {
        match parse_line(line) {
            Ok(ParsedLine::Event(event)) => self.apply(event),
            Ok(ParsedLine::Ignored(IgnoredLine::Blank | IgnoredLine::UnknownEvent(_))) => None,
            Err(err) => {
                warn!(
                    "skipping unparseable runner output: {}",
                    DisplayErrorChain::new(&err)
                );
                debug!("unparseable line: {line}");
                None
            }
        }
    }

    /// Applies a single event.
    pub fn apply(&mut self, event: RunnerEvent) -> Option<Refresh> {
        debug!("applying {} event", event.tag());
        match event {
            RunnerEvent::TestStart(descriptor) => Some(self.tree.test_started(&descriptor)),
            RunnerEvent::TestResult(results) => Some(self.tree.test_finished(
                *results,
                &mut self.issues,
                self.resolver.as_ref(),
            )),
            RunnerEvent::RunComplete(summary) => {
                log_summary(&summary);
                self.run_complete()
            }
        }
    }

    /// The result tree.
    pub fn tree(&self) -> &ResultTree {
        &self.tree
    }

    /// The published diagnostics.
    pub fn issues(&self) -> &IssueIndex {
        &self.issues
    }

    fn run_complete(&mut self) -> Option<Refresh> {
        match self.prune {
            PruneMode::Never => None,
            PruneMode::OnRunComplete => {
                let suite_exists: &(dyn Fn(&Utf8Path) -> bool + Send + Sync) =
                    &*self.suite_exists.0;
                let removed = self.tree.prune_missing(suite_exists, &mut self.issues);
                if removed.is_empty() {
                    return None;
                }
                info!(
                    "removed {} missing {}",
                    removed.len(),
                    plural::suites_str(removed.len())
                );
                Some(Refresh::Full)
            }
        }
    }
}

fn log_summary(summary: &AggregatedSummary) {
    match (summary.num_total_tests, summary.num_failed_tests) {
        (Some(total), Some(failed)) => info!("run complete: {failed} of {total} tests failed"),
        (Some(total), None) => info!("run complete: {total} tests"),
        _ => info!("run complete"),
    }
}

/// Receives everything the user should see.
pub trait ViewSink {
    /// Part or all of the tree changed.
    fn refresh(&mut self, pipeline: &Pipeline, refresh: &Refresh);

    /// The runner's status changed.
    fn status_changed(&mut self, status: &RunnerStatus, version: &RunnerVersion);

    /// The runner wrote a line to standard error.
    fn runner_stderr(&mut self, _line: &str) {}

    /// A selection was opened.
    fn opened(&mut self, _summary: OpenSummary) {}
}

/// A command for a running [`Coordinator`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CoordinatorCommand {
    /// Tear everything down and start over.
    Restart,

    /// Open the given nodes in the workspace.
    OpenSelection(Vec<TreeNode>),

    /// Stop the runner and return from [`Coordinator::run`].
    Shutdown,
}

#[derive(Debug)]
struct Active {
    supervisor: Supervisor,
    events: mpsc::UnboundedReceiver<SupervisorEvent>,
}

/// Owns the runner process and everything derived from its output.
#[derive(Debug)]
pub struct Coordinator<V, W> {
    config: JestviewConfig,
    resolver: Arc<dyn StackTraceResolver>,
    pipeline: Pipeline,
    status: RunnerStatus,
    version: RunnerVersion,
    view: DebugIgnore<V>,
    workspace: DebugIgnore<W>,
}

impl<V: ViewSink, W: Workspace> Coordinator<V, W> {
    /// Creates a new coordinator. Nothing is started until [`run`](Self::run) is called.
    pub fn new(config: JestviewConfig, view: V, workspace: W) -> Self {
        let resolver: Arc<dyn StackTraceResolver> = Arc::new(NodeStackResolver);
        Self {
            pipeline: Pipeline::new(config.prune(), resolver.clone()),
            config,
            resolver,
            status: RunnerStatus::Inactive,
            version: RunnerVersion::Unknown,
            view: DebugIgnore(view),
            workspace: DebugIgnore(workspace),
        }
    }

    /// The current pipeline.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// The runner's status.
    pub fn status(&self) -> &RunnerStatus {
        &self.status
    }

    /// The version reported by the last probe.
    pub fn version(&self) -> &RunnerVersion {
        &self.version
    }

    /// The view sink.
    pub fn view(&self) -> &V {
        &self.view
    }

    /// Consumes the coordinator, returning the view sink.
    pub fn into_view(self) -> V {
        self.view.0
    }

    /// Starts the runner and processes its output and `commands` until a
    /// [`CoordinatorCommand::Shutdown`] arrives or the command channel closes.
    ///
    /// An exited or unstartable runner is reported through the status, and only a restart brings
    /// it back.
    pub async fn run(&mut self, mut commands: mpsc::UnboundedReceiver<CoordinatorCommand>) {
        let mut active = self.launch().await;

        loop {
            tokio::select! {
                event = next_event(active.as_mut()), if active.is_some() => match event {
                    Some(SupervisorEvent::Stdout(line)) => {
                        if let Some(refresh) = self.pipeline.handle_line(&line) {
                            self.view.refresh(&self.pipeline, &refresh);
                        }
                    }
                    Some(SupervisorEvent::Stderr(line)) => self.view.runner_stderr(&line),
                    Some(SupervisorEvent::Exited(exit)) => {
                        self.stop(active.take()).await;
                        let failure = RunnerFailure::Exited(format!("runner {exit}"));
                        self.set_status(RunnerStatus::Error(failure));
                    }
                    None => {
                        self.stop(active.take()).await;
                        let failure = RunnerFailure::Exited("runner output closed".to_owned());
                        self.set_status(RunnerStatus::Error(failure));
                    }
                },
                command = commands.recv() => match command {
                    Some(CoordinatorCommand::Restart) => {
                        active = self.restart(active.take()).await;
                    }
                    Some(CoordinatorCommand::OpenSelection(selection)) => {
                        let targets = self.pipeline.tree().open_targets(&selection);
                        let summary = open_selection(&*self.workspace, &targets).await;
                        self.view.opened(summary);
                    }
                    Some(CoordinatorCommand::Shutdown) | None => break,
                },
            }
        }

        self.stop(active).await;
        self.set_status(RunnerStatus::Inactive);
    }

    async fn launch(&mut self) -> Option<Active> {
        self.set_status(RunnerStatus::Starting);
        let started = Supervisor::start(&self.config).await;
        self.started(started.map(|(supervisor, events)| Active { supervisor, events }))
    }

    async fn restart(&mut self, active: Option<Active>) -> Option<Active> {
        info!("restarting runner");
        self.pipeline = Pipeline::new(self.config.prune(), self.resolver.clone());
        self.view.refresh(&self.pipeline, &Refresh::Full);

        let Some(Active { mut supervisor, .. }) = active else {
            return self.launch().await;
        };
        self.set_status(RunnerStatus::Starting);
        let restarted = supervisor.restart(&self.config).await;
        self.started(restarted.map(|events| Active { supervisor, events }))
    }

    fn started(&mut self, started: Result<Active, SupervisorError>) -> Option<Active> {
        match started {
            Ok(active) => {
                self.version = active.supervisor.version().clone();
                self.set_status(RunnerStatus::Running);
                Some(active)
            }
            Err(err) => {
                error!("{}", DisplayErrorChain::new(&err));
                self.set_status(RunnerStatus::Error(RunnerFailure::StartFailed(err.to_string())));
                None
            }
        }
    }

    async fn stop(&mut self, active: Option<Active>) {
        let Some(Active { mut supervisor, .. }) = active else {
            return;
        };
        if let Err(err) = supervisor.shutdown().await {
            warn!("{}", DisplayErrorChain::new(&err));
        }
    }

    fn set_status(&mut self, status: RunnerStatus) {
        debug!("runner status: {status}");
        self.status = status;
        self.view.status_changed(&self.status, &self.version);
    }
}

async fn next_event(active: Option<&mut Active>) -> Option<SupervisorEvent> {
    match active {
        Some(active) => active.events.recv().await,
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::NodeStackResolver;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    const SUITE_A: &str = r#"{"event":"onTestResult","data":{"testFilePath":"/ws/a.test.js","testResults":[{"ancestorTitles":["math"],"title":"adds","fullName":"math adds","status":"failed","failureMessages":["boom"],"failureDetails":[{"message":"boom","stack":"Error: boom\n    at Object.<anonymous> (/ws/lib/add.js:4:11)"}],"location":{"line":3,"column":5}}],"failureMessage":null}}"#;

    fn pipeline(prune: PruneMode) -> Pipeline {
        Pipeline::new(prune, Arc::new(NodeStackResolver))
    }

    #[test]
    fn handle_line_refreshes() {
        let mut pipeline = pipeline(PruneMode::Never);

        assert_eq!(
            pipeline.handle_line(r#"{"event":"onTestStart","data":{"path":"/ws/a.test.js"}}"#),
            Some(Refresh::Full)
        );
        let refresh = pipeline.handle_line(SUITE_A).expect("result refreshes");
        let Refresh::Suite(root) = refresh else {
            panic!("known suite gets a targeted refresh, got {refresh:?}");
        };
        assert_eq!(root.identifier(), "/ws/a.test.js");
        assert!(!root.is_leaf());

        let suite = pipeline
            .tree()
            .suite(Utf8Path::new("/ws/a.test.js"))
            .expect("suite known");
        assert!(!suite.is_running());
        assert_eq!(
            pipeline
                .issues()
                .issues_for_file(Utf8Path::new("/ws/lib/add.js"))
                .count(),
            1
        );
    }

    #[test]
    fn unrecognized_status_keeps_suite() {
        let mut pipeline = pipeline(PruneMode::Never);
        pipeline.handle_line(r#"{"event":"onTestStart","data":{"path":"/ws/a.test.js"}}"#);

        let refresh = pipeline.handle_line(
            r#"{"event":"onTestResult","data":{"testFilePath":"/ws/a.test.js","testResults":[{"ancestorTitles":[],"title":"plain","fullName":"plain","status":"passed","failureMessages":[],"failureDetails":[]},{"ancestorTitles":[],"title":"only","fullName":"only","status":"focused","failureMessages":[],"failureDetails":[],"location":{"line":7,"column":1}}],"failureMessage":null}}"#,
        );
        assert_eq!(
            refresh,
            Some(Refresh::Suite(TreeNode::new(
                vec!["/ws/a.test.js".to_owned()],
                false
            )))
        );

        let suite = pipeline
            .tree()
            .suite(Utf8Path::new("/ws/a.test.js"))
            .expect("suite known");
        assert!(!suite.is_running());
        assert_eq!(suite.records().len(), 2);
        assert_eq!(
            pipeline
                .issues()
                .issues_for_file(Utf8Path::new("/ws/a.test.js"))
                .count(),
            0,
            "a test with an unrecognized status gets no diagnostic"
        );
    }

    #[test]
    fn handle_line_skips_noise() {
        let mut pipeline = pipeline(PruneMode::Never);
        for line in [
            "",
            "   ",
            r#"{"event":"onSomethingElse","data":{}}"#,
            "Determining test suites to run...",
            r#"{"event":"onTestResult","data":{}}"#,
        ] {
            assert_eq!(pipeline.handle_line(line), None, "line: {line:?}");
        }
        assert!(pipeline.tree().is_empty());
        assert!(pipeline.issues().is_empty());
    }

    #[test]
    fn run_complete_prunes_when_enabled() {
        let mut never = pipeline(PruneMode::Never).with_suite_exists(|_| false);
        never.handle_line(SUITE_A);
        assert_eq!(never.handle_line(r#"{"event":"onRunComplete"}"#), None);
        assert_eq!(never.tree().len(), 1);

        let mut prune = pipeline(PruneMode::OnRunComplete).with_suite_exists(|_| false);
        prune.handle_line(SUITE_A);
        assert_eq!(prune.issues().len(), 1);
        assert_eq!(
            prune.handle_line(r#"{"event":"onRunComplete","data":{"numTotalTests":1}}"#),
            Some(Refresh::Full)
        );
        assert!(prune.tree().is_empty());
        assert!(prune.issues().is_empty());

        let mut kept = pipeline(PruneMode::OnRunComplete).with_suite_exists(|_| true);
        kept.handle_line(SUITE_A);
        assert_eq!(kept.handle_line(r#"{"event":"onRunComplete"}"#), None);
        assert_eq!(kept.tree().len(), 1);
    }

    #[cfg(unix)]
    mod run {
        use super::*;
        use crate::tree::{DisplayContext, NodeColor, OpenTarget};
        use camino::Utf8PathBuf;
        use camino_tempfile::{Utf8TempDir, tempdir};
        use camino_tempfile_ext::prelude::*;
        use indoc::formatdoc;
        use jestview_metadata::TestLocation;
        use pretty_assertions::assert_eq;
        use std::{future::Future, io, sync::Mutex, time::Duration};

        /// Sends the next scripted command each time the runner stops.
        struct ScriptedView {
            commands: mpsc::UnboundedSender<CoordinatorCommand>,
            on_error: Vec<Vec<CoordinatorCommand>>,
            statuses: Vec<String>,
            refreshes: Vec<Refresh>,
            colors: Vec<Option<NodeColor>>,
            opened: Vec<OpenSummary>,
        }

        impl ViewSink for ScriptedView {
            fn refresh(&mut self, pipeline: &Pipeline, refresh: &Refresh) {
                self.refreshes.push(refresh.clone());
                if let Refresh::Suite(node) = refresh {
                    let cx = DisplayContext::new("/ws", None);
                    self.colors.push(pipeline.tree().display(node, &cx).color);
                }
            }

            fn status_changed(&mut self, status: &RunnerStatus, version: &RunnerVersion) {
                self.statuses.push(format!("{} ({version})", status.label()));
                if status.is_error() && !self.on_error.is_empty() {
                    for command in self.on_error.remove(0) {
                        _ = self.commands.send(command);
                    }
                }
            }

            fn opened(&mut self, summary: OpenSummary) {
                self.opened.push(summary);
            }
        }

        #[derive(Default)]
        struct RecordingWorkspace {
            revealed: Mutex<Vec<String>>,
        }

        impl Workspace for RecordingWorkspace {
            type Document = Utf8PathBuf;

            fn open(
                &self,
                path: &Utf8Path,
            ) -> impl Future<Output = io::Result<Utf8PathBuf>> + Send {
                std::future::ready(Ok(path.to_owned()))
            }

            fn reveal(
                &self,
                document: &Utf8PathBuf,
                location: TestLocation,
            ) -> impl Future<Output = ()> + Send {
                self.revealed
                    .lock()
                    .expect("not poisoned")
                    .push(format!("{document}:{location}"));
                std::future::ready(())
            }
        }

        fn setup(program: &str) -> (Utf8TempDir, JestviewConfig) {
            let temp_dir = tempdir().expect("created temp dir");
            temp_dir
                .child("fake-runner.sh")
                .write_str(&formatdoc! {r#"
                    if [ "$1" = "--version" ]; then echo "29.7.0"; exit 0; fi
                    echo '{{"event":"onTestStart","data":{{"path":"/ws/a.test.js"}}}}'
                    cat <<'JSON'
                    {SUITE_A}
                    JSON
                    echo 'not json'
                    exit 1
                "#})
                .expect("wrote fake runner");
            temp_dir
                .child(JestviewConfig::CONFIG_PATH)
                .write_str(&formatdoc! {r#"
                    [runner]
                    program = "{program}"
                    version-args = ["fake-runner.sh", "--version"]
                    watch-args = ["fake-runner.sh"]
                    reporter = "reporter.js"
                "#})
                .expect("wrote config");
            let config =
                JestviewConfig::from_sources(temp_dir.path(), None).expect("config is valid");
            (temp_dir, config)
        }

        fn coordinator(
            config: JestviewConfig,
            on_error: Vec<Vec<CoordinatorCommand>>,
        ) -> (
            Coordinator<ScriptedView, RecordingWorkspace>,
            mpsc::UnboundedReceiver<CoordinatorCommand>,
        ) {
            let (sender, receiver) = mpsc::unbounded_channel();
            let view = ScriptedView {
                commands: sender,
                on_error,
                statuses: Vec::new(),
                refreshes: Vec::new(),
                colors: Vec::new(),
                opened: Vec::new(),
            };
            (
                Coordinator::new(config, view, RecordingWorkspace::default()),
                receiver,
            )
        }

        async fn run_with_timeout(
            coordinator: &mut Coordinator<ScriptedView, RecordingWorkspace>,
            commands: mpsc::UnboundedReceiver<CoordinatorCommand>,
        ) {
            tokio::time::timeout(Duration::from_secs(30), coordinator.run(commands))
                .await
                .expect("coordinator finished in time");
        }

        #[tokio::test]
        async fn runner_exit_then_open_and_shutdown() {
            let (_temp_dir, config) = setup("sh");
            let leaf = TreeNode::new(
                vec!["/ws/a.test.js".to_owned(), "math".to_owned(), "adds".to_owned()],
                true,
            );
            let (mut coordinator, commands) = coordinator(
                config,
                vec![vec![
                    CoordinatorCommand::OpenSelection(vec![leaf.clone()]),
                    CoordinatorCommand::Shutdown,
                ]],
            );
            run_with_timeout(&mut coordinator, commands).await;

            let view = coordinator.view();
            assert_eq!(
                view.statuses,
                vec![
                    "starting (unknown)",
                    "running (29.7.0)",
                    "error (29.7.0)",
                    "inactive (29.7.0)",
                ]
            );
            assert_eq!(
                view.refreshes,
                vec![
                    Refresh::Full,
                    Refresh::Suite(TreeNode::new(vec!["/ws/a.test.js".to_owned()], false)),
                ]
            );
            // The suite has no suite-level failure message, so its root stays green.
            assert_eq!(view.colors, vec![Some(NodeColor::Success)]);
            assert_eq!(
                view.opened,
                vec![OpenSummary {
                    opened: 1,
                    revealed: 1
                }]
            );
            assert_eq!(
                coordinator.pipeline().tree().open_targets(&[leaf]),
                vec![OpenTarget {
                    path: "/ws/a.test.js".into(),
                    location: Some(TestLocation { line: 3, column: 5 }),
                }]
            );
            assert_eq!(
                *coordinator.workspace.revealed.lock().expect("not poisoned"),
                vec!["/ws/a.test.js:3:5".to_owned()]
            );
            assert_eq!(coordinator.status(), &RunnerStatus::Inactive);
        }

        #[tokio::test]
        async fn restart_discards_state() {
            let (_temp_dir, config) = setup("sh");
            let (mut coordinator, commands) = coordinator(
                config,
                vec![
                    vec![CoordinatorCommand::Restart],
                    vec![CoordinatorCommand::Shutdown],
                ],
            );
            run_with_timeout(&mut coordinator, commands).await;

            let view = coordinator.view();
            assert_eq!(
                view.statuses,
                vec![
                    "starting (unknown)",
                    "running (29.7.0)",
                    "error (29.7.0)",
                    "starting (29.7.0)",
                    "running (29.7.0)",
                    "error (29.7.0)",
                    "inactive (29.7.0)",
                ]
            );
            // The suite is new again after the restart, so it gets a full refresh.
            let root = Refresh::Suite(TreeNode::new(vec!["/ws/a.test.js".to_owned()], false));
            assert_eq!(
                view.refreshes,
                vec![
                    Refresh::Full,
                    root.clone(),
                    Refresh::Full,
                    Refresh::Full,
                    root,
                ]
            );
            assert_eq!(coordinator.pipeline().tree().len(), 1);
        }

        #[tokio::test]
        async fn spawn_failure_sets_error_status() {
            let (_temp_dir, config) = setup("./no-such-dir/jest");
            let (mut coordinator, commands) =
                coordinator(config, vec![vec![CoordinatorCommand::Shutdown]]);
            run_with_timeout(&mut coordinator, commands).await;

            let view = coordinator.view();
            assert_eq!(
                view.statuses,
                vec!["starting (unknown)", "error (unknown)", "inactive (unknown)"]
            );
            assert!(view.refreshes.is_empty());
        }
    }

    #[test]
    fn summary_logging_handles_missing_fields() {
        // Only checks that every shape is accepted.
        for summary in [
            AggregatedSummary::default(),
            serde_json::from_str(indoc! {r#"{"numTotalTests": 3}"#}).expect("valid summary"),
            serde_json::from_str(r#"{"numTotalTests": 3, "numFailedTests": 1}"#)
                .expect("valid summary"),
        ] {
            log_summary(&summary);
        }
    }
}
