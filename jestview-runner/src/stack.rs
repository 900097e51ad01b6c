// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolving failure stack traces to source locations.

use crate::helpers::normalize_path;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::{fmt, sync::LazyLock};

/// A location in a source file that a stack trace points at.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CallSite {
    /// The file, normalized.
    pub file: Utf8PathBuf,

    /// The 1-based line number.
    pub line: u32,

    /// The 1-based column number.
    pub column: u32,
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Turns a raw stack string into the call site most likely to be of interest.
///
/// Resolution is best-effort: `None` means no usable frame was found.
pub trait StackTraceResolver: fmt::Debug + Send + Sync {
    /// Returns the first resolvable call site in `stack`.
    fn resolve(&self, stack: &str) -> Option<CallSite>;
}

/// Resolves V8-style stack traces, as produced by Node.
///
/// Frames inside Node's own internals and inside `node_modules` are skipped, so that the first
/// frame returned belongs to the project under test. That frame may be in a helper module rather
/// than the test file itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct NodeStackResolver;

static FRAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*at (?:(?:async )?.+? \()?(?P<file>.+?):(?P<line>\d+):(?P<column>\d+)\)?\s*$")
        .expect("frame regex is valid")
});

impl NodeStackResolver {
    fn is_internal(file: &str) -> bool {
        file.starts_with("node:")
            || file.starts_with("internal/")
            || file.contains("/node_modules/")
            || file.contains("\\node_modules\\")
            || file == "<anonymous>"
            || file == "native"
    }
}

impl StackTraceResolver for NodeStackResolver {
    fn resolve(&self, stack: &str) -> Option<CallSite> {
        stack.lines().find_map(|line| {
            let captures = FRAME_REGEX.captures(line)?;
            let file = &captures["file"];
            let file = file.strip_prefix("file://").unwrap_or(file);
            if Self::is_internal(file) {
                return None;
            }
            Some(CallSite {
                file: normalize_path(Utf8Path::new(file)),
                line: captures["line"].parse().ok()?,
                column: captures["column"].parse().ok()?,
            })
        })
    }
}
