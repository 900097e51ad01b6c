// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to the machine-readable output of a Jest watch run.
//!
//! The Jest reporter shipped with jestview writes one JSON object per line to
//! stdout. Each object carries an `event` tag and a `data` payload; the payload
//! types for the tags jestview understands live in this crate.

mod exit_codes;
mod test_result;

pub use exit_codes::*;
pub use test_result::*;
