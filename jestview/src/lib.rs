// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A terminal viewer for Jest watch runs.
//!
//! This crate is the command-line frontend. The pipeline itself lives in `jestview-runner`.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod input;
mod output;
mod view;

#[doc(hidden)]
pub use dispatch::JestviewApp;
#[doc(hidden)]
pub use errors::ExpectedError;
