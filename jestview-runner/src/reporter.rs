// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The bundled Jest reporter that produces the event stream.

use crate::errors::SupervisorError;
use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

/// Source of the bundled reporter module.
pub const BUNDLED_REPORTER: &str = include_str!("../reporter/jestview-reporter.js");

/// The file name the bundled reporter is installed under.
pub const BUNDLED_REPORTER_FILE_NAME: &str = "jestview-reporter.js";

/// Where the bundled reporter is installed, relative to the workspace root.
pub const BUNDLED_REPORTER_DIR: &str = "node_modules/.cache/jestview";

/// Returns the reporter to pass to the runner.
///
/// An explicitly configured reporter is used as-is. Otherwise the bundled reporter is written
/// into the workspace's `node_modules/.cache` directory, unless an identical copy already exists.
pub fn resolve_reporter(
    workspace_root: &Utf8Path,
    configured: Option<&Utf8Path>,
) -> Result<Utf8PathBuf, SupervisorError> {
    if let Some(reporter) = configured {
        return Ok(reporter.to_owned());
    }
    install_bundled_reporter(&workspace_root.join(BUNDLED_REPORTER_DIR))
}

/// Writes the bundled reporter into `dir`, returning its path.
pub fn install_bundled_reporter(dir: &Utf8Path) -> Result<Utf8PathBuf, SupervisorError> {
    let path = dir.join(BUNDLED_REPORTER_FILE_NAME);
    if std::fs::read_to_string(&path).is_ok_and(|existing| existing == BUNDLED_REPORTER) {
        return Ok(path);
    }

    debug!("installing bundled reporter at {path}");
    std::fs::create_dir_all(dir)
        .and_then(|()| std::fs::write(&path, BUNDLED_REPORTER))
        .map_err(|err| SupervisorError::InstallReporter {
            path: path.clone(),
            err,
        })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use camino_tempfile_ext::prelude::*;

    #[test]
    fn configured_reporter_wins() {
        let reporter = resolve_reporter(
            Utf8Path::new("/ws"),
            Some(Utf8Path::new("/ws/tools/reporter.js")),
        )
        .expect("no install needed");
        assert_eq!(reporter, "/ws/tools/reporter.js");
    }

    #[test]
    fn installs_into_workspace_cache() {
        let temp_dir = Utf8TempDir::new().expect("created temp dir");
        let path = resolve_reporter(temp_dir.path(), None).expect("installed");
        assert_eq!(
            path,
            temp_dir
                .path()
                .join("node_modules/.cache/jestview/jestview-reporter.js")
        );
        let contents = std::fs::read_to_string(&path).expect("reporter written");
        assert_eq!(contents, BUNDLED_REPORTER);
        assert!(contents.contains("onTestStart"));
    }

    #[test]
    fn replaces_stale_copy() {
        let temp_dir = Utf8TempDir::new().expect("created temp dir");
        temp_dir
            .child(BUNDLED_REPORTER_FILE_NAME)
            .write_str("// stale")
            .expect("wrote stale reporter");

        let path = install_bundled_reporter(temp_dir.path()).expect("installed");
        assert_eq!(
            std::fs::read_to_string(&path).expect("reporter written"),
            BUNDLED_REPORTER
        );
    }
}
