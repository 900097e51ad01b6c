// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing of the line-delimited event stream written by the reporter.
//!
//! Each non-blank line is a JSON object of the form `{"event": "<tag>", "data": <payload>}`.

use crate::errors::ParseLineError;
use jestview_metadata::{AggregatedSummary, SuiteDescriptor, SuiteResult};
use serde::Deserialize;
use tracing::warn;

const EVENT_TEST_START: &str = "onTestStart";
const EVENT_TEST_RESULT: &str = "onTestResult";
const EVENT_RUN_COMPLETE: &str = "onRunComplete";

/// An event emitted by the runner.
#[derive(Clone, Debug, PartialEq)]
pub enum RunnerEvent {
    /// A suite is about to run.
    TestStart(SuiteDescriptor),

    /// A suite finished running.
    TestResult(Box<SuiteResult>),

    /// Every suite in the current watch iteration has reported.
    RunComplete(AggregatedSummary),
}

impl RunnerEvent {
    /// Returns the wire tag for this event.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::TestStart(_) => EVENT_TEST_START,
            Self::TestResult(_) => EVENT_TEST_RESULT,
            Self::RunComplete(_) => EVENT_RUN_COMPLETE,
        }
    }
}

/// The outcome of parsing a single line.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedLine {
    /// The line was a recognized event.
    Event(RunnerEvent),

    /// The line carried nothing to act on.
    Ignored(IgnoredLine),
}

/// Why a line was ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IgnoredLine {
    /// The line was empty or consisted only of whitespace.
    Blank,

    /// The line was a well-formed event with a tag jestview doesn't know about.
    UnknownEvent(String),
}

#[derive(Deserialize)]
struct RawEvent {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Parses one line of runner output.
///
/// Unknown event tags are ignored (with a warning) so that newer reporters keep working. Lines that
/// aren't JSON, or whose payload doesn't match the tag, produce an error that the caller is
/// expected to log and skip.
pub fn parse_line(line: &str) -> Result<ParsedLine, ParseLineError> {
    if line.trim().is_empty() {
        return Ok(ParsedLine::Ignored(IgnoredLine::Blank));
    }

    let RawEvent { event, data } = serde_json::from_str(line).map_err(ParseLineError::Json)?;

    let event = match event.as_str() {
        EVENT_TEST_START => RunnerEvent::TestStart(payload(EVENT_TEST_START, data)?),
        EVENT_TEST_RESULT => RunnerEvent::TestResult(Box::new(payload(EVENT_TEST_RESULT, data)?)),
        // Reporters aren't required to send a summary.
        EVENT_RUN_COMPLETE if data.is_null() => RunnerEvent::RunComplete(Default::default()),
        EVENT_RUN_COMPLETE => RunnerEvent::RunComplete(payload(EVENT_RUN_COMPLETE, data)?),
        _ => {
            warn!("ignoring unexpected runner event `{event}`");
            return Ok(ParsedLine::Ignored(IgnoredLine::UnknownEvent(event)));
        }
    };

    Ok(ParsedLine::Event(event))
}

fn payload<T: for<'de> Deserialize<'de>>(
    event: &'static str,
    data: serde_json::Value,
) -> Result<T, ParseLineError> {
    serde_json::from_value(data).map_err(|err| ParseLineError::Payload { event, err })
}
