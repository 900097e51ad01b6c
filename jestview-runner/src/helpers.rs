// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Path helpers shared by the tree and the issue index.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

/// Lexically normalizes a path: removes `.` components, resolves `..` against preceding normal
/// components and collapses repeated separators.
///
/// The filesystem is not consulted, so symlinks are not resolved.
pub fn normalize_path(path: &Utf8Path) -> Utf8PathBuf {
    let mut out = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::Prefix(_) | Utf8Component::RootDir => {
                out.push(component.as_str());
            }
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                let popped = matches!(
                    out.components().next_back(),
                    Some(Utf8Component::Normal(_))
                ) && out.pop();
                // `..` at the root stays at the root; `..` in a relative path with nothing left
                // to pop is preserved.
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            Utf8Component::Normal(name) => out.push(name),
        }
    }
    out
}

/// Produces a short, human-readable form of `path` for display.
///
/// Paths inside `workspace_root` are shown relative to it, and paths inside `home` have it
/// replaced with `~`. Anything else is shown as-is.
pub fn clean_path(path: &Utf8Path, workspace_root: &Utf8Path, home: Option<&Utf8Path>) -> String {
    if let Ok(rel) = path.strip_prefix(workspace_root) {
        if !rel.as_str().is_empty() {
            return convert_rel_path_to_forward_slash(rel).into_string();
        }
    }
    if let Some(home) = home {
        if let Ok(rel) = path.strip_prefix(home) {
            return format!("~/{}", convert_rel_path_to_forward_slash(rel));
        }
    }
    path.to_string()
}

/// Returns the `file://` identifier used to key issue collections.
pub fn file_uri(path: &Utf8Path) -> String {
    format!("file://{path}")
}

#[cfg(windows)]
pub(crate) fn convert_rel_path_to_forward_slash(rel_path: &Utf8Path) -> Utf8PathBuf {
    if !rel_path.is_relative() {
        panic!("path for conversion to forward slash '{rel_path}' is not relative");
    }
    rel_path.as_str().replace('\\', "/").into()
}

#[cfg(not(windows))]
pub(crate) fn convert_rel_path_to_forward_slash(rel_path: &Utf8Path) -> Utf8PathBuf {
    rel_path.to_path_buf()
}

pub(crate) mod plural {
    /// Returns "suite" if `count` is 1, otherwise "suites".
    pub(crate) fn suites_str(count: usize) -> &'static str {
        if count == 1 { "suite" } else { "suites" }
    }

    /// Returns "diagnostic" if `count` is 1, otherwise "diagnostics".
    pub(crate) fn diagnostics_str(count: usize) -> &'static str {
        if count == 1 {
            "diagnostic"
        } else {
            "diagnostics"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("/a/b/c.test.js", "/a/b/c.test.js"; "already normal")]
    #[test_case("/a/./b//c.test.js", "/a/b/c.test.js"; "dot and double slash")]
    #[test_case("/a/x/../b/c.test.js", "/a/b/c.test.js"; "parent dir")]
    #[test_case("/../a.test.js", "/a.test.js"; "parent of root")]
    #[test_case("a/../../b.js", "../b.js"; "relative escapes")]
    fn normalize(input: &str, expected: &str) {
        assert_eq!(normalize_path(Utf8Path::new(input)), expected);
    }

    #[test_case("/ws/src/a.test.js", Some("/home/u"), "src/a.test.js"; "inside workspace")]
    #[test_case("/home/u/other/a.test.js", Some("/home/u"), "~/other/a.test.js"; "inside home")]
    #[test_case("/opt/a.test.js", Some("/home/u"), "/opt/a.test.js"; "elsewhere")]
    #[test_case("/ws", None, "/ws"; "workspace root itself")]
    fn clean(input: &str, home: Option<&str>, expected: &str) {
        assert_eq!(
            clean_path(
                Utf8Path::new(input),
                Utf8Path::new("/ws"),
                home.map(Utf8Path::new)
            ),
            expected
        );
    }

    #[test]
    fn file_uri_prefix() {
        assert_eq!(file_uri(Utf8Path::new("/a/b.js")), "file:///a/b.js");
    }
}
