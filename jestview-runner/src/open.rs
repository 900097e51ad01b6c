// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opening selected results in an editor.

use crate::tree::OpenTarget;
use camino::Utf8Path;
use futures::future::join_all;
use jestview_metadata::TestLocation;
use std::{future::Future, io};
use tracing::{debug, warn};

/// The editor-side operations needed to open results.
pub trait Workspace {
    /// An opened file.
    type Document;

    /// Opens `path`.
    fn open(&self, path: &Utf8Path) -> impl Future<Output = io::Result<Self::Document>> + Send;

    /// Moves the cursor in `document` to `location`.
    fn reveal(
        &self,
        document: &Self::Document,
        location: TestLocation,
    ) -> impl Future<Output = ()> + Send;
}

/// What happened when opening a selection.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct OpenSummary {
    /// Files that were opened.
    pub opened: usize,

    /// Locations that were revealed.
    pub revealed: usize,
}

/// Opens every target's file concurrently, then reveals locations one at a time in `targets`
/// order.
///
/// Targets that fail to open, or that have no location, are skipped without affecting the others.
pub async fn open_selection<W: Workspace>(workspace: &W, targets: &[OpenTarget]) -> OpenSummary {
    let documents = join_all(targets.iter().map(|target| workspace.open(&target.path))).await;

    let mut summary = OpenSummary::default();
    for (target, document) in targets.iter().zip(documents) {
        let document = match document {
            Ok(document) => document,
            Err(err) => {
                warn!("failed to open {}: {err}", target.path);
                continue;
            }
        };
        summary.opened += 1;

        match target.location {
            Some(location) => {
                workspace.reveal(&document, location).await;
                summary.revealed += 1;
            }
            None => debug!("no location to reveal in {}", target.path),
        }
    }
    summary
}
