// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Diagnostics synthesized from suite results.
//!
//! Diagnostics are grouped into one [`IssueCollection`] per suite. A collection may hold
//! diagnostics for several files: a failure whose stack trace points into a shared helper is filed
//! under the helper's identifier, but still belongs to the suite that produced it. Republishing a
//! suite replaces its whole collection and never touches another suite's.

use crate::{
    helpers::{file_uri, plural},
    stack::StackTraceResolver,
};
use camino::Utf8Path;
use jestview_metadata::{SuiteResult, TestStatus};
use std::collections::BTreeMap;
use tracing::debug;

/// How severe a diagnostic is.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum IssueSeverity {
    /// A failing test.
    Error,

    /// A test that didn't run: skipped, pending, todo or disabled.
    Hint,
}

impl IssueSeverity {
    /// Returns the severity for a test with the given status, or `None` if the status doesn't
    /// warrant a diagnostic.
    pub fn for_status(status: TestStatus) -> Option<Self> {
        match status {
            TestStatus::Passed | TestStatus::Unknown => None,
            TestStatus::Failed => Some(Self::Error),
            TestStatus::Skipped | TestStatus::Pending | TestStatus::Todo | TestStatus::Disabled => {
                Some(Self::Hint)
            }
        }
    }
}

/// A location-tagged annotation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Issue {
    /// The severity.
    pub severity: IssueSeverity,

    /// The descriptive message.
    pub message: String,

    /// A short label for where the issue came from: the test's title.
    pub source: Option<String>,

    /// The full name of the test that produced a stack-derived issue.
    pub code: Option<String>,

    /// The 1-based line.
    pub line: u32,

    /// The 1-based column.
    pub column: u32,
}

/// The diagnostics published by a single suite, keyed by file identifier.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IssueCollection {
    issues: BTreeMap<String, Vec<Issue>>,
}

impl IssueCollection {
    /// Returns the issues filed under `uri`.
    pub fn get(&self, uri: &str) -> &[Issue] {
        self.issues.get(uri).map(Vec::as_slice).unwrap_or_default()
    }

    /// Iterates over `(uri, issues)` pairs, ordered by identifier.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Issue])> + '_ {
        self.issues
            .iter()
            .map(|(uri, issues)| (uri.as_str(), issues.as_slice()))
    }

    /// Returns the total number of issues across all files.
    pub fn len(&self) -> usize {
        self.issues.values().map(Vec::len).sum()
    }

    /// Returns true if there are no issues.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append(&mut self, uri: String, issue: Issue) {
        self.issues.entry(uri).or_default().push(issue);
    }
}

/// Every suite's issue collection.
#[derive(Clone, Debug, Default)]
pub struct IssueIndex {
    collections: BTreeMap<String, IssueCollection>,
}

impl IssueIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all diagnostics for `suite_key` with ones derived from `result`.
    ///
    /// Returns the number of diagnostics now published for the suite.
    pub fn publish(
        &mut self,
        suite_key: &Utf8Path,
        result: &SuiteResult,
        resolver: &dyn StackTraceResolver,
    ) -> usize {
        let suite_uri = file_uri(suite_key);
        let mut collection = IssueCollection::default();

        for record in &result.test_results {
            let Some(severity) = IssueSeverity::for_status(record.status) else {
                continue;
            };

            if let Some(location) = record.location {
                collection.append(
                    suite_uri.clone(),
                    Issue {
                        severity,
                        message: record.full_name.clone(),
                        source: Some(record.title.clone()),
                        code: None,
                        line: location.line,
                        column: location.column,
                    },
                );
            }

            for (index, detail) in record.failure_details.iter().enumerate() {
                let Some(stack) = &detail.stack else {
                    continue;
                };
                let Some(call_site) = resolver.resolve(stack) else {
                    debug!(
                        "no call site found in stack for `{}` in {suite_key}",
                        record.full_name
                    );
                    continue;
                };
                let message = detail
                    .message
                    .clone()
                    .or_else(|| record.failure_messages.get(index).cloned())
                    .unwrap_or_else(|| record.full_name.clone());
                collection.append(
                    file_uri(&call_site.file),
                    Issue {
                        severity: IssueSeverity::Error,
                        message,
                        source: None,
                        code: Some(record.full_name.clone()),
                        line: call_site.line,
                        column: call_site.column,
                    },
                );
            }
        }

        let count = collection.len();
        debug!(
            "published {count} {} for {suite_key}",
            plural::diagnostics_str(count)
        );
        self.collections.insert(suite_uri, collection);
        count
    }

    /// Returns the collection for `suite_key`, if it has ever been published.
    pub fn collection(&self, suite_key: &Utf8Path) -> Option<&IssueCollection> {
        self.collections.get(&file_uri(suite_key))
    }

    /// Iterates over every issue filed under `file`, across all suites.
    pub fn issues_for_file(&self, file: &Utf8Path) -> impl Iterator<Item = &Issue> {
        let uri = file_uri(file);
        self.collections
            .values()
            .flat_map(move |collection| collection.get(&uri).iter())
    }

    /// Removes the collection for `suite_key`, returning it if it existed.
    pub fn remove(&mut self, suite_key: &Utf8Path) -> Option<IssueCollection> {
        self.collections.remove(&file_uri(suite_key))
    }

    /// Returns the number of suites with a published collection.
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    /// Returns true if nothing has been published.
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}
