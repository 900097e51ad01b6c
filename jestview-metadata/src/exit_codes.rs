// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `jestview` failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum JestviewExitCode {}

impl JestviewExitCode {
    /// No errors occurred and jestview exited normally.
    pub const OK: i32 = 0;

    /// The watch-mode runner exited on its own, without being asked to.
    pub const RUNNER_EXITED: i32 = 100;

    /// The runner process could not be spawned.
    pub const RUNNER_SPAWN_FAILED: i32 = 102;

    /// A user issue happened while setting up a jestview invocation, for example an invalid
    /// configuration file.
    pub const SETUP_ERROR: i32 = 96;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
