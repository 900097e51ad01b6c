// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for jestview: supervising a Jest watch run and projecting its event stream
//! into a result tree and per-file diagnostics.
//!
//! The flow of data is one-directional. The [`supervisor`] turns the runner's stdout into lines,
//! the [`event`] parser turns lines into events, and the [`coordinator`] applies events to the
//! [`tree`] and the [`issues`] index, telling the view which part of the tree to reload.

pub mod config;
pub mod coordinator;
pub mod errors;
pub mod event;
pub mod helpers;
pub mod issues;
pub mod open;
pub mod reporter;
pub mod stack;
pub mod status;
pub mod supervisor;
pub mod tree;
