// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal rendering of the result tree.

use camino::{Utf8Path, Utf8PathBuf};
use jestview_metadata::TestLocation;
use jestview_runner::{
    coordinator::{Pipeline, ViewSink},
    open::{OpenSummary, Workspace},
    status::{RunnerFailure, RunnerStatus, RunnerVersion},
    tree::{DisplayContext, NodeColor, NodeDisplay, NodeKind, Refresh, ResultTree, TreeNode},
};
use owo_colors::{OwoColorize, Style, style};
use std::{
    future::Future,
    io::{self, Write},
    sync::{Arc, Mutex},
};
use swrite::{SWrite, swrite};
use tracing::debug;

/// The rows of the last rendered tree, shared with the input reader so that rows can be opened
/// by number.
pub(crate) type SharedRows = Arc<Mutex<Vec<TreeNode>>>;

#[derive(Clone, Debug, Default)]
pub(crate) struct ViewStyles {
    pass: Style,
    fail: Style,
    pending: Style,
    row: Style,
    bold: Style,
}

impl ViewStyles {
    pub(crate) fn colorize(&mut self) {
        self.pass = style().green().bold();
        self.fail = style().red().bold();
        self.pending = style().yellow().bold();
        self.row = style().dimmed();
        self.bold = style().bold();
    }
}

/// Characters used to draw the tree.
#[derive(Clone, Debug, Default)]
pub(crate) struct ThemeCharacters {
    use_unicode: bool,
}

impl ThemeCharacters {
    pub(crate) fn use_unicode(&mut self) {
        self.use_unicode = true;
    }

    fn tree_branch(&self) -> &'static str {
        if self.use_unicode { "├─ " } else { "|- " }
    }

    fn tree_last(&self) -> &'static str {
        if self.use_unicode { "└─ " } else { "\\- " }
    }

    fn tree_continuation(&self) -> &'static str {
        if self.use_unicode { "│  " } else { "|  " }
    }

    fn tree_space(&self) -> &'static str {
        "   "
    }

    fn test_marker(&self, color: Option<NodeColor>) -> &'static str {
        match (color, self.use_unicode) {
            (Some(NodeColor::Success), true) => "✓",
            (Some(NodeColor::Success), false) => "+",
            (Some(NodeColor::Failure), true) => "✕",
            (Some(NodeColor::Failure), false) => "x",
            (Some(NodeColor::Pending), true) => "○",
            (Some(NodeColor::Pending) | None, false) => "o",
            (None, true) => "·",
        }
    }
}

/// Renders the whole tree, returning the text and the node for each numbered row.
pub(crate) fn render_tree(
    tree: &ResultTree,
    cx: &DisplayContext,
    styles: &ViewStyles,
    theme: &ThemeCharacters,
) -> (String, Vec<TreeNode>) {
    let mut out = String::new();
    let mut rows = Vec::new();
    let mut renderer = Renderer {
        tree,
        cx,
        styles,
        theme,
        out: &mut out,
        rows: &mut rows,
    };
    renderer.render_children(None, "");
    if rows.is_empty() {
        swrite!(out, "{}\n", "waiting for test results...".style(styles.row));
    }
    (out, rows)
}

struct Renderer<'a> {
    tree: &'a ResultTree,
    cx: &'a DisplayContext,
    styles: &'a ViewStyles,
    theme: &'a ThemeCharacters,
    out: &'a mut String,
    rows: &'a mut Vec<TreeNode>,
}

impl Renderer<'_> {
    fn render_children(&mut self, parent: Option<&TreeNode>, prefix: &str) {
        let children = self.tree.children(parent);
        let count = children.len();
        for (index, child) in children.into_iter().enumerate() {
            let is_last = index + 1 == count;
            let (branch, continuation) = match parent {
                None => ("", ""),
                Some(_) if is_last => (self.theme.tree_last(), self.theme.tree_space()),
                Some(_) => (self.theme.tree_branch(), self.theme.tree_continuation()),
            };

            let display = self.tree.display(&child, self.cx);
            self.rows.push(child.clone());
            swrite!(
                self.out,
                "{:>4} {prefix}{branch}",
                self.rows.len().style(self.styles.row)
            );
            self.write_label(&display);
            self.out.push('\n');

            if !child.is_leaf() {
                let child_prefix = format!("{prefix}{continuation}");
                self.render_children(Some(&child), &child_prefix);
            }
        }
    }

    fn write_label(&mut self, display: &NodeDisplay) {
        let color_style = match display.color {
            Some(NodeColor::Success) => self.styles.pass,
            Some(NodeColor::Failure) => self.styles.fail,
            Some(NodeColor::Pending) => self.styles.pending,
            None => Style::new(),
        };

        match display.kind {
            NodeKind::Suite => {
                let marker = match display.color {
                    Some(NodeColor::Success) => "PASS",
                    Some(NodeColor::Failure) => "FAIL",
                    Some(NodeColor::Pending) | None => "RUNS",
                };
                swrite!(
                    self.out,
                    "{} {}",
                    marker.style(color_style),
                    display.label.style(self.styles.bold)
                );
            }
            NodeKind::Test => {
                swrite!(
                    self.out,
                    "{} {}",
                    self.theme.test_marker(display.color).style(color_style),
                    display.label
                );
            }
            NodeKind::Group | NodeKind::Placeholder => self.out.push_str(&display.label),
        }

        if let Some(description) = display
            .description
            .as_deref()
            .and_then(|description| description.lines().map(str::trim).find(|l| !l.is_empty()))
        {
            swrite!(self.out, ": {}", description.style(color_style));
        }
    }
}

/// A view that redraws the tree on stdout after every change.
pub(crate) struct TerminalView<W> {
    out: W,
    cx: DisplayContext,
    styles: ViewStyles,
    theme: ThemeCharacters,
    rows: SharedRows,
    verbose: bool,
    last_failure: Option<RunnerFailure>,
    write_error: Option<io::Error>,
}

impl<W: Write> TerminalView<W> {
    pub(crate) fn new(
        out: W,
        cx: DisplayContext,
        styles: ViewStyles,
        theme: ThemeCharacters,
        verbose: bool,
    ) -> Self {
        Self {
            out,
            cx,
            styles,
            theme,
            rows: SharedRows::default(),
            verbose,
            last_failure: None,
            write_error: None,
        }
    }

    pub(crate) fn rows(&self) -> SharedRows {
        self.rows.clone()
    }

    /// The failure the runner was in when the view last heard from it.
    pub(crate) fn last_failure(&self) -> Option<&RunnerFailure> {
        self.last_failure.as_ref()
    }

    pub(crate) fn take_write_error(&mut self) -> Option<io::Error> {
        self.write_error.take()
    }

    fn write(&mut self, text: &str) {
        if self.write_error.is_some() {
            return;
        }
        if let Err(err) = self
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush())
        {
            self.write_error = Some(err);
        }
    }
}

impl<W: Write> ViewSink for TerminalView<W> {
    fn refresh(&mut self, pipeline: &Pipeline, refresh: &Refresh) {
        // A terminal can't update a single subtree in place.
        if let Refresh::Suite(node) = refresh {
            debug!("redrawing for {}", node.suite_key());
        }

        let (text, rows) = render_tree(pipeline.tree(), &self.cx, &self.styles, &self.theme);
        *self.rows.lock().unwrap_or_else(|err| err.into_inner()) = rows;
        self.write(&format!("\n{text}"));
    }

    fn status_changed(&mut self, status: &RunnerStatus, version: &RunnerVersion) {
        let status_style = match status {
            RunnerStatus::Running => self.styles.pass,
            RunnerStatus::Error(_) => self.styles.fail,
            RunnerStatus::Starting | RunnerStatus::Inactive => self.styles.pending,
        };
        match status {
            RunnerStatus::Running => self.last_failure = None,
            RunnerStatus::Error(failure) => self.last_failure = Some(failure.clone()),
            RunnerStatus::Starting | RunnerStatus::Inactive => {}
        }
        let text = format!(
            "{} {} (jest {version})\n",
            "runner".style(self.styles.bold),
            status.style(status_style)
        );
        self.write(&text);
    }

    fn runner_stderr(&mut self, line: &str) {
        if self.verbose {
            let text = format!("{}\n", line.style(self.styles.row));
            self.write(&text);
        }
    }

    fn opened(&mut self, summary: OpenSummary) {
        debug!(
            "opened {} files, revealed {} locations",
            summary.opened, summary.revealed
        );
    }
}

/// Opens results by printing their locations, in a form editors and terminals can jump to.
#[derive(Clone, Debug, Default)]
pub(crate) struct PrintWorkspace;

impl Workspace for PrintWorkspace {
    type Document = Utf8PathBuf;

    fn open(&self, path: &Utf8Path) -> impl Future<Output = io::Result<Utf8PathBuf>> + Send {
        let path = path.to_owned();
        async move {
            tokio::fs::metadata(&path).await?;
            println!("{path}");
            Ok(path)
        }
    }

    fn reveal(
        &self,
        document: &Utf8PathBuf,
        location: TestLocation,
    ) -> impl Future<Output = ()> + Send {
        println!("{document}:{location}");
        std::future::ready(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jestview_runner::{config::PruneMode, stack::NodeStackResolver};
    use pretty_assertions::assert_eq;

    const LINES: &[&str] = &[
        r#"{"event":"onTestResult","data":{"testFilePath":"/ws/a.test.js","testResults":[{"ancestorTitles":["math"],"title":"adds","fullName":"math adds","status":"passed","failureMessages":[],"failureDetails":[]},{"ancestorTitles":["math"],"title":"subtracts","fullName":"math subtracts","status":"failed","failureMessages":["\nexpected 1, got 2\n    at foo"],"failureDetails":[]},{"ancestorTitles":[],"title":"top","fullName":"top","status":"passed","failureMessages":[],"failureDetails":[]}],"failureMessage":"math subtracts failed"}}"#,
        r#"{"event":"onTestStart","data":{"path":"/ws/b.test.js"}}"#,
    ];

    fn pipeline() -> Pipeline {
        let mut pipeline = Pipeline::new(PruneMode::Never, Arc::new(NodeStackResolver));
        for line in LINES {
            pipeline.handle_line(line);
        }
        pipeline
    }

    #[test]
    fn render_ascii_tree() {
        let pipeline = pipeline();
        let cx = DisplayContext::new("/ws", None);
        let (text, rows) = render_tree(
            pipeline.tree(),
            &cx,
            &ViewStyles::default(),
            &ThemeCharacters::default(),
        );
        let expected = [
            "   1 FAIL a.test.js: math subtracts failed",
            "   2 |- math",
            "   3 |  |- + adds",
            "   4 |  \\- x subtracts: expected 1, got 2",
            "   5 \\- + top",
            "   6 RUNS b.test.js",
        ];
        assert_eq!(text.lines().collect::<Vec<_>>(), expected);
        assert_eq!(rows.len(), 6);
        assert_eq!(
            rows[3],
            TreeNode::new(
                vec![
                    "/ws/a.test.js".to_owned(),
                    "math".to_owned(),
                    "subtracts".to_owned(),
                ],
                true,
            )
        );
        assert!(rows[5].is_leaf());
    }

    #[test]
    fn render_empty_tree() {
        let tree = ResultTree::new();
        let cx = DisplayContext::new("/ws", None);
        let (text, rows) = render_tree(
            &tree,
            &cx,
            &ViewStyles::default(),
            &ThemeCharacters::default(),
        );
        assert_eq!(text, "waiting for test results...\n");
        assert!(rows.is_empty());
    }

    #[test]
    fn terminal_view_tracks_rows_and_failures() {
        let pipeline = pipeline();
        let mut view = TerminalView::new(
            Vec::new(),
            DisplayContext::new("/ws", None),
            ViewStyles::default(),
            ThemeCharacters::default(),
            false,
        );
        let rows = view.rows();

        view.refresh(&pipeline, &Refresh::Full);
        assert_eq!(rows.lock().expect("not poisoned").len(), 6);

        let version = RunnerVersion::Known("29.7.0".to_owned());
        view.status_changed(
            &RunnerStatus::Error(RunnerFailure::Exited("runner exited with code 1".to_owned())),
            &version,
        );
        assert!(matches!(view.last_failure(), Some(RunnerFailure::Exited(_))));
        view.status_changed(&RunnerStatus::Running, &version);
        assert_eq!(view.last_failure(), None);

        view.runner_stderr("hidden unless verbose");
        let output = String::from_utf8(view.out.clone()).expect("valid UTF-8");
        assert!(output.contains("runner error: runner exited with code 1 (jest 29.7.0)"));
        assert!(output.contains("runner running (jest 29.7.0)"));
        assert!(!output.contains("hidden unless verbose"));
        assert!(view.take_write_error().is_none());
    }
}
