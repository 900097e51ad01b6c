// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Feeds recorded runner output through the pipeline and checks the resulting tree and
//! diagnostics.

use camino::Utf8Path;
use jestview_runner::{
    config::PruneMode,
    coordinator::Pipeline,
    issues::IssueSeverity,
    stack::NodeStackResolver,
    tree::{DisplayContext, NodeColor, NodeKind, Refresh, TreeNode},
};
use maplit::btreemap;
use pretty_assertions::assert_eq;
use std::{collections::BTreeMap, sync::Arc};

const WATCH_RUN: &str = include_str!("fixtures/watch-run.jsonl");

const SUM_FIXED: &str = r#"{"event":"onTestResult","data":{"testFilePath":"/ws/src/sum.test.js","testResults":[{"ancestorTitles":["sum"],"title":"adds positive numbers","fullName":"sum adds positive numbers","status":"passed","failureMessages":[],"failureDetails":[],"location":{"line":4,"column":3}},{"ancestorTitles":["sum"],"title":"adds negative numbers","fullName":"sum adds negative numbers","status":"passed","failureMessages":[],"failureDetails":[],"location":{"line":8,"column":3}}],"failureMessage":null}}"#;

fn pipeline() -> Pipeline {
    Pipeline::new(PruneMode::Never, Arc::new(NodeStackResolver))
}

fn node(segments: &[&str], is_leaf: bool) -> TreeNode {
    TreeNode::new(segments.iter().map(|s| (*s).to_owned()).collect(), is_leaf)
}

fn labels(pipeline: &Pipeline, parent: Option<&TreeNode>) -> Vec<String> {
    let cx = DisplayContext::new("/ws", None);
    pipeline
        .tree()
        .children(parent)
        .iter()
        .map(|child| pipeline.tree().display(child, &cx).label)
        .collect()
}

fn issue_counts(pipeline: &Pipeline, file: &str) -> BTreeMap<IssueSeverity, usize> {
    let mut counts = BTreeMap::new();
    for issue in pipeline.issues().issues_for_file(Utf8Path::new(file)) {
        *counts.entry(issue.severity).or_default() += 1;
    }
    counts
}

#[test]
fn recorded_watch_run() {
    let mut pipeline = pipeline();
    let refreshes: Vec<_> = WATCH_RUN
        .lines()
        .map(|line| pipeline.handle_line(line))
        .collect();

    assert_eq!(
        refreshes,
        vec![
            Some(Refresh::Full),
            Some(Refresh::Full),
            None,
            Some(Refresh::Suite(node(&["/ws/src/sum.test.js"], false))),
            None,
            Some(Refresh::Suite(node(&["/ws/src/format.test.js"], false))),
            None,
            None,
        ]
    );

    // Suites stay in the order they were first seen.
    assert_eq!(
        labels(&pipeline, None),
        vec!["src/sum.test.js", "src/format.test.js"]
    );

    let sum = node(&["/ws/src/sum.test.js"], false);
    assert_eq!(labels(&pipeline, Some(&sum)), vec!["sum", "is a function"]);
    assert_eq!(
        labels(&pipeline, Some(&node(&["/ws/src/sum.test.js", "sum"], false))),
        vec!["adds positive numbers", "adds negative numbers"]
    );

    let format = node(&["/ws/src/format.test.js"], false);
    let format_children = pipeline.tree().children(Some(&format));
    assert_eq!(
        format_children,
        vec![node(&["/ws/src/format.test.js", "format"], false)]
    );
    assert_eq!(
        labels(&pipeline, Some(&format_children[0])),
        vec!["dates", "pads numbers"]
    );

    let cx = DisplayContext::new("/ws", None);
    let display = pipeline.tree().display(&sum, &cx);
    assert_eq!(display.kind, NodeKind::Suite);
    assert_eq!(display.color, Some(NodeColor::Failure));
    assert_eq!(
        display.description.as_deref(),
        Some("  ● sum › adds negative numbers")
    );

    let passing = node(
        &["/ws/src/sum.test.js", "sum", "adds positive numbers"],
        true,
    );
    let display = pipeline.tree().display(&passing, &cx);
    assert_eq!(display.color, Some(NodeColor::Success));
    assert_eq!(
        display.tooltip.as_deref(),
        Some("sum adds positive numbers (2ms)")
    );

    assert_eq!(
        issue_counts(&pipeline, "/ws/src/sum.test.js"),
        btreemap! { IssueSeverity::Error => 2, IssueSeverity::Hint => 1 }
    );
    assert_eq!(
        issue_counts(&pipeline, "/ws/src/format.test.js"),
        btreemap! { IssueSeverity::Error => 1 }
    );

    // The format suite's failure points into a helper module.
    let helper: Vec<_> = pipeline
        .issues()
        .issues_for_file(Utf8Path::new("/ws/src/lib/date.js"))
        .collect();
    assert_eq!(helper.len(), 1);
    assert_eq!(helper[0].message, "TypeError: Cannot read properties of undefined");
    assert_eq!(helper[0].code.as_deref(), Some("format dates uses ISO format"));
    assert_eq!((helper[0].line, helper[0].column), (22, 14));
}

#[test]
fn rerun_replaces_only_its_own_diagnostics() {
    let mut pipeline = pipeline();
    for line in WATCH_RUN.lines() {
        pipeline.handle_line(line);
    }

    let sum = node(&["/ws/src/sum.test.js"], false);
    let cx = DisplayContext::new("/ws", None);

    assert_eq!(
        pipeline.handle_line(r#"{"event":"onTestStart","data":{"path":"/ws/src/sum.test.js"}}"#),
        Some(Refresh::Suite(sum.clone()))
    );
    assert_eq!(
        pipeline.tree().display(&sum, &cx).color,
        Some(NodeColor::Pending)
    );
    // Old results stay visible while the suite re-runs.
    assert_eq!(labels(&pipeline, Some(&sum)), vec!["sum", "is a function"]);

    assert_eq!(
        pipeline.handle_line(SUM_FIXED),
        Some(Refresh::Suite(sum.clone()))
    );
    assert_eq!(
        pipeline.tree().display(&sum, &cx).color,
        Some(NodeColor::Success)
    );
    assert_eq!(labels(&pipeline, Some(&sum)), vec!["sum"]);
    assert!(issue_counts(&pipeline, "/ws/src/sum.test.js").is_empty());

    // Another suite's cross-file diagnostics are untouched.
    assert_eq!(
        issue_counts(&pipeline, "/ws/src/lib/date.js"),
        btreemap! { IssueSeverity::Error => 1 }
    );
}

#[test]
fn pruning_removes_deleted_suites() {
    let mut pipeline = Pipeline::new(PruneMode::OnRunComplete, Arc::new(NodeStackResolver))
        .with_suite_exists(|path| path != "/ws/src/format.test.js");
    let refreshes: Vec<_> = WATCH_RUN
        .lines()
        .map(|line| pipeline.handle_line(line))
        .collect();

    assert_eq!(refreshes.last(), Some(&Some(Refresh::Full)));
    assert_eq!(labels(&pipeline, None), vec!["src/sum.test.js"]);
    assert!(issue_counts(&pipeline, "/ws/src/lib/date.js").is_empty());
}
