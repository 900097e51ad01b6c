// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The result tree: per-suite run state, projected into a lazily-computed hierarchy.
//!
//! Nodes are identified purely by their segment sequence `[suite, ancestor..., title]`. Nothing
//! is cached between queries, so a view layer can diff old and new children by value: a node
//! that didn't change compares equal to its previous incarnation.

use crate::{
    helpers::{clean_path, normalize_path},
    issues::IssueIndex,
    stack::StackTraceResolver,
};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, IndexSet};
use jestview_metadata::{SuiteDescriptor, SuiteResult, TestLocation, TestRecord};
use std::hash::{Hash, Hasher};
use tracing::{debug, warn};

/// Joins segments into a node identifier. Never appears in a file path or test title.
pub const IDENTIFIER_SEPARATOR: &str = "__JEST_EXTENSION__";

/// The state of a single test suite.
#[derive(Clone, Debug)]
pub struct SuiteRunState {
    key: Utf8PathBuf,
    is_running: bool,
    results: Option<SuiteResult>,
}

impl SuiteRunState {
    /// The normalized path of the test file.
    pub fn key(&self) -> &Utf8Path {
        &self.key
    }

    /// True between a start event and the matching result event.
    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// The last results reported for this suite, kept while a re-run is in flight.
    pub fn results(&self) -> Option<&SuiteResult> {
        self.results.as_ref()
    }

    /// The test records from the last results, or an empty slice.
    pub fn records(&self) -> &[TestRecord] {
        self.results
            .as_ref()
            .map_or(&[], |results| results.test_results.as_slice())
    }
}

/// A node in the result tree.
///
/// Equality and hashing only consider [`segments`](Self::segments).
#[derive(Clone, Debug)]
pub struct TreeNode {
    segments: Vec<String>,
    is_leaf: bool,
}

impl TreeNode {
    /// Creates a node from its segments.
    ///
    /// # Panics
    ///
    /// Panics if `segments` is empty: the virtual root is represented by `None`, not a node.
    pub fn new(segments: Vec<String>, is_leaf: bool) -> Self {
        assert!(!segments.is_empty(), "tree nodes have at least one segment");
        Self { segments, is_leaf }
    }

    /// Parses a node from an identifier produced by [`identifier`](Self::identifier).
    ///
    /// The leaf flag isn't part of the identifier, so the returned node is marked as a non-leaf.
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        if identifier.is_empty() {
            return None;
        }
        let segments = identifier
            .split(IDENTIFIER_SEPARATOR)
            .map(str::to_owned)
            .collect();
        Some(Self::new(segments, false))
    }

    fn suite_root(key: &Utf8Path, is_leaf: bool) -> Self {
        Self::new(vec![key.to_string()], is_leaf)
    }

    fn child(&self, name: &str, is_leaf: bool) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(name.to_owned());
        Self { segments, is_leaf }
    }

    /// The full segment sequence.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True if this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    /// The suite this node belongs to.
    pub fn suite_key(&self) -> &Utf8Path {
        Utf8Path::new(&self.segments[0])
    }

    /// The segments after the suite key.
    pub fn ancestors(&self) -> &[String] {
        &self.segments[1..]
    }

    /// True if this node is a suite root.
    pub fn is_suite_root(&self) -> bool {
        self.segments.len() == 1
    }

    /// A stable identifier for this node.
    pub fn identifier(&self) -> String {
        self.segments.join(IDENTIFIER_SEPARATOR)
    }
}

impl PartialEq for TreeNode {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for TreeNode {}

impl Hash for TreeNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}

/// Which part of the tree a view should reload after an event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Refresh {
    /// Reload everything.
    Full,

    /// Only this suite root changed. Reloading everything instead is always correct.
    Suite(TreeNode),
}

/// The colour a node is shown in.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NodeColor {
    /// Everything passed.
    Success,

    /// Something failed.
    Failure,

    /// The suite is running.
    Pending,
}

/// What kind of node is being displayed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NodeKind {
    /// A test file.
    Suite,

    /// A `describe` block.
    Group,

    /// A single test.
    Test,

    /// A node whose suite isn't known.
    Placeholder,
}

/// How a node should be rendered.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeDisplay {
    /// The main label.
    pub label: String,

    /// What kind of node this is.
    pub kind: NodeKind,

    /// The colour, if any.
    pub color: Option<NodeColor>,

    /// Secondary text shown next to the label.
    pub description: Option<String>,

    /// Text shown on hover.
    pub tooltip: Option<String>,

    /// True if the node has children to expand.
    pub collapsible: bool,

    /// The node's stable identifier.
    pub identifier: String,

    /// The test file, for suite roots.
    pub path: Option<Utf8PathBuf>,
}

/// Paths used to shorten suite labels.
#[derive(Clone, Debug)]
pub struct DisplayContext {
    workspace_root: Utf8PathBuf,
    home: Option<Utf8PathBuf>,
}

impl DisplayContext {
    /// Creates a new display context.
    pub fn new(workspace_root: impl Into<Utf8PathBuf>, home: Option<Utf8PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            home,
        }
    }
}

/// A file to open for a selected node, and where to put the cursor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OpenTarget {
    /// The test file.
    pub path: Utf8PathBuf,

    /// The test's own location, if the node is a test and the runner reported one.
    pub location: Option<TestLocation>,
}

/// Per-suite run state, and the tree queries over it.
#[derive(Clone, Debug, Default)]
pub struct ResultTree {
    suites: IndexMap<Utf8PathBuf, SuiteRunState>,
}

impl ResultTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a suite has started running.
    ///
    /// Results from a previous run are kept so the view can keep showing them.
    pub fn test_started(&mut self, descriptor: &SuiteDescriptor) -> Refresh {
        let key = normalize_path(&descriptor.path);
        debug!("suite started: {key}");

        match self.suites.get_mut(&key) {
            Some(state) => {
                state.is_running = true;
                self.root_refresh(&key)
            }
            None => {
                self.suites.insert(
                    key.clone(),
                    SuiteRunState {
                        key,
                        is_running: true,
                        results: None,
                    },
                );
                Refresh::Full
            }
        }
    }

    /// Records a suite's results and republishes its diagnostics.
    pub fn test_finished(
        &mut self,
        results: SuiteResult,
        issues: &mut IssueIndex,
        resolver: &dyn StackTraceResolver,
    ) -> Refresh {
        let key = normalize_path(&results.test_file_path);
        debug!(
            "suite finished: {key} ({} tests)",
            results.test_results.len()
        );

        issues.publish(&key, &results, resolver);

        match self.suites.get_mut(&key) {
            Some(state) => {
                state.is_running = false;
                state.results = Some(results);
                self.root_refresh(&key)
            }
            None => {
                self.suites.insert(
                    key.clone(),
                    SuiteRunState {
                        key,
                        is_running: false,
                        results: Some(results),
                    },
                );
                Refresh::Full
            }
        }
    }

    /// Removes suites that are not running and whose test file no longer exists, along with their
    /// diagnostics. Returns the removed keys.
    pub fn prune_missing(
        &mut self,
        exists: impl Fn(&Utf8Path) -> bool,
        issues: &mut IssueIndex,
    ) -> Vec<Utf8PathBuf> {
        let mut removed = Vec::new();
        self.suites.retain(|key, state| {
            if state.is_running || exists(key) {
                true
            } else {
                removed.push(key.clone());
                false
            }
        });
        for key in &removed {
            debug!("pruning missing suite: {key}");
            issues.remove(key);
        }
        removed
    }

    /// Returns the state for `key`.
    pub fn suite(&self, key: &Utf8Path) -> Option<&SuiteRunState> {
        self.suites.get(key)
    }

    /// Iterates over suites in the order they were first seen.
    pub fn suites(&self) -> impl Iterator<Item = &SuiteRunState> {
        self.suites.values()
    }

    /// The number of known suites.
    pub fn len(&self) -> usize {
        self.suites.len()
    }

    /// True if no suite has been seen.
    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }

    /// Returns the root node for a suite.
    pub fn root_node(&self, key: &Utf8Path) -> Option<TreeNode> {
        let state = self.suites.get(key)?;
        Some(TreeNode::suite_root(key, state.records().is_empty()))
    }

    /// Returns the children of `node`, or the suite roots if `node` is `None`.
    pub fn children(&self, node: Option<&TreeNode>) -> Vec<TreeNode> {
        let Some(node) = node else {
            return self
                .suites
                .iter()
                .map(|(key, state)| TreeNode::suite_root(key, state.records().is_empty()))
                .collect();
        };

        let Some(state) = self.suites.get(node.suite_key()) else {
            return Vec::new();
        };
        let ancestors = node.ancestors();

        let mut groups = IndexSet::new();
        let mut children = Vec::new();
        for record in state
            .records()
            .iter()
            .filter(|record| record.ancestor_titles.starts_with(ancestors))
        {
            match record.ancestor_titles.get(ancestors.len()) {
                Some(next) => {
                    // Deeper levels are only revealed when this group is expanded.
                    if groups.insert(next.as_str()) {
                        children.push(node.child(next, false));
                    }
                }
                None => children.push(node.child(&record.title, true)),
            }
        }
        children
    }

    /// Returns the parent of `node`, or `None` for suite roots.
    pub fn parent(&self, node: &TreeNode) -> Option<TreeNode> {
        let (_, parent) = node.segments.split_last()?;
        if parent.is_empty() {
            return None;
        }
        Some(TreeNode::new(parent.to_vec(), false))
    }

    /// Returns the test record a leaf node refers to.
    pub fn find_record(&self, node: &TreeNode) -> Option<&TestRecord> {
        let (title, ancestors) = node.ancestors().split_last()?;
        self.suites
            .get(node.suite_key())?
            .records()
            .iter()
            .find(|record| record.title == *title && record.ancestor_titles == ancestors)
    }

    /// Returns how `node` should be rendered.
    pub fn display(&self, node: &TreeNode, cx: &DisplayContext) -> NodeDisplay {
        let identifier = node.identifier();
        let Some(state) = self.suites.get(node.suite_key()) else {
            return NodeDisplay {
                label: "...".to_owned(),
                kind: NodeKind::Placeholder,
                color: None,
                description: None,
                tooltip: None,
                collapsible: false,
                identifier,
                path: None,
            };
        };

        let mut node_display = NodeDisplay {
            label: node.segments.last().cloned().unwrap_or_default(),
            kind: NodeKind::Group,
            color: None,
            description: None,
            tooltip: None,
            collapsible: !node.is_leaf,
            identifier,
            path: None,
        };

        if node.is_suite_root() {
            node_display.kind = NodeKind::Suite;
            node_display.label = clean_path(&state.key, &cx.workspace_root, cx.home.as_deref());
            node_display.path = Some(state.key.clone());
            // An empty failure message counts as success.
            let failure_message = state
                .results
                .as_ref()
                .and_then(|r| r.failure_message.as_ref())
                .filter(|message| !message.is_empty());
            match failure_message {
                Some(message) => {
                    node_display.color = Some(NodeColor::Failure);
                    node_display.description = Some(message.clone());
                    node_display.tooltip = Some(message.clone());
                }
                None => node_display.color = Some(NodeColor::Success),
            }
        } else if node.is_leaf {
            node_display.kind = NodeKind::Test;
            match self.find_record(node) {
                Some(record) => match record.failure_messages.first() {
                    Some(message) => {
                        node_display.color = Some(NodeColor::Failure);
                        node_display.description = Some(message.clone());
                        node_display.tooltip = Some(message.clone());
                    }
                    None => {
                        node_display.color = Some(NodeColor::Success);
                        node_display.tooltip = Some(match record.duration {
                            Some(duration) => format!("{} ({duration}ms)", record.full_name),
                            None => record.full_name.clone(),
                        });
                    }
                },
                None => {
                    warn!("failed to find results for `{}`", node_display.label);
                    return node_display;
                }
            }
        } else {
            return node_display;
        }

        if state.is_running {
            node_display.color = Some(NodeColor::Pending);
        }
        node_display
    }

    /// Returns the files to open for a selection, in selection order.
    ///
    /// Only suite roots and tests are openable; groups are skipped.
    pub fn open_targets(&self, selection: &[TreeNode]) -> Vec<OpenTarget> {
        selection
            .iter()
            .filter(|node| node.is_leaf || node.is_suite_root())
            .map(|node| OpenTarget {
                path: node.suite_key().to_owned(),
                location: if node.is_suite_root() {
                    None
                } else {
                    self.find_record(node).and_then(|record| record.location)
                },
            })
            .collect()
    }

    fn root_refresh(&self, key: &Utf8Path) -> Refresh {
        match self.root_node(key) {
            Some(node) => Refresh::Suite(node),
            None => Refresh::Full,
        }
    }
}
