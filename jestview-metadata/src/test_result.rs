// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The payload of an `onTestStart` event: a test suite that is about to run.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SuiteDescriptor {
    /// The absolute path to the test file.
    pub path: Utf8PathBuf,
}

/// The payload of an `onTestResult` event: the results for a single test file.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuiteResult {
    /// The absolute path to the test file.
    pub test_file_path: Utf8PathBuf,

    /// One record per test case, in the order the runner reported them.
    #[serde(default)]
    pub test_results: Vec<TestRecord>,

    /// A suite-level failure, for example a syntax error that prevented any test from being
    /// collected.
    #[serde(default)]
    pub failure_message: Option<String>,
}

impl SuiteResult {
    /// Returns true if no test cases were collected for this suite.
    pub fn is_empty(&self) -> bool {
        self.test_results.is_empty()
    }
}

/// The result of a single test case.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestRecord {
    /// The enclosing `describe` blocks, outermost first.
    #[serde(default)]
    pub ancestor_titles: Vec<String>,

    /// The name of the test itself.
    pub title: String,

    /// The ancestor titles and the title, joined with spaces.
    #[serde(default)]
    pub full_name: String,

    /// The status of the test.
    pub status: TestStatus,

    /// Human-readable failure text, empty if the test passed.
    #[serde(default)]
    pub failure_messages: Vec<String>,

    /// Raw failure objects as reported by the runner.
    #[serde(default)]
    pub failure_details: Vec<FailureDetail>,

    /// Where the test was defined, if `--testLocationInResults` was passed.
    #[serde(default)]
    pub location: Option<TestLocation>,

    /// How long the test took to run, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// The status of a test case.
#[derive(Copy, Clone, Debug, Deserialize, Serialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// The test passed.
    Passed,

    /// The test failed.
    Failed,

    /// The test was skipped, e.g. through `it.skip`.
    Skipped,

    /// The test is pending.
    Pending,

    /// The test is declared through `it.todo`.
    Todo,

    /// The test was disabled.
    Disabled,

    /// A status jestview doesn't know about, such as `focused`.
    #[serde(other)]
    Unknown,
}

impl TestStatus {
    /// Returns the string used for this status on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Pending => "pending",
            Self::Todo => "todo",
            Self::Disabled => "disabled",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw failure object.
///
/// Jest serializes whatever was thrown, so failure details are not guaranteed to be objects.
/// Anything that isn't an object with string `message`/`stack` fields is kept as an empty detail.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(from = "serde_json::Value")]
pub struct FailureDetail {
    /// The error message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// The raw stack trace, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl From<serde_json::Value> for FailureDetail {
    fn from(value: serde_json::Value) -> Self {
        let field = |name: &str| {
            value
                .get(name)
                .and_then(|v| v.as_str())
                .map(|s| s.to_owned())
        };
        Self {
            message: field("message"),
            stack: field("stack"),
        }
    }
}

/// A line and column within a source file, as reported by the runner.
#[derive(Copy, Clone, Debug, Deserialize, Serialize, Eq, PartialEq, Hash)]
pub struct TestLocation {
    /// The line number.
    pub line: u32,

    /// The column number.
    pub column: u32,
}

impl fmt::Display for TestLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The payload of an `onRunComplete` event, emitted once every suite in a watch iteration has
/// reported.
///
/// All fields are optional so that reporters are free to send an empty object.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedSummary {
    /// The total number of tests.
    #[serde(default)]
    pub num_total_tests: Option<u64>,

    /// The number of tests that passed.
    #[serde(default)]
    pub num_passed_tests: Option<u64>,

    /// The number of tests that failed.
    #[serde(default)]
    pub num_failed_tests: Option<u64>,

    /// Whether the run as a whole succeeded.
    #[serde(default)]
    pub success: Option<bool>,
}
