//! Path normalization and case handling.
//!
//! Every map in the loader is keyed by a [`PathKey`]: the lexically normalized
//! path with `/` separators, lower-cased when the file system is
//! case-insensitive. The original spelling is kept next to the key by the
//! owning store so diagnostics show what the user wrote.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Case sensitivity of the file system holding the sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PathCase {
    #[default]
    Sensitive,
    Insensitive,
}

impl PathCase {
    /// Guess from the target platform without touching the disk.
    pub fn platform_default() -> Self {
        if cfg!(any(windows, target_os = "macos")) {
            PathCase::Insensitive
        } else {
            PathCase::Sensitive
        }
    }

    /// Probe the temp directory: create a mixed-case file and look it up with
    /// the case swapped. Falls back to the platform default when probing fails.
    pub fn detect() -> Self {
        Self::detect_in(&std::env::temp_dir())
    }

    pub fn detect_in(dir: &Path) -> Self {
        let probe = dir.join(format!("tsz-Case-Probe-{}", std::process::id()));
        if std::fs::write(&probe, b"").is_err() {
            return Self::platform_default();
        }
        let swapped = dir.join(format!("TSZ-cASE-pROBE-{}", std::process::id()));
        let case = if swapped.exists() {
            PathCase::Insensitive
        } else {
            PathCase::Sensitive
        };
        let _ = std::fs::remove_file(&probe);
        case
    }

    pub fn key(self, path: &Path) -> PathKey {
        let normalized = normalize_path(path);
        let mut text = normalized.to_string_lossy().replace('\\', "/");
        if self == PathCase::Insensitive {
            text = text.to_lowercase();
        }
        PathKey(text)
    }
}

/// Normalized lookup key for a source path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey(String);

impl PathKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// parent. No file system access, so symlinks are not resolved.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::RootDir | Component::Normal(_) | Component::Prefix(_) => {
                normalized.push(component.as_os_str());
            }
        }
    }

    normalized
}

const DECLARATION_SUFFIXES: [&str; 3] = [".d.ts", ".d.mts", ".d.cts"];

/// `true` for `.d.ts` / `.d.mts` / `.d.cts` files.
pub fn is_declaration_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let name = name.to_ascii_lowercase();
    DECLARATION_SUFFIXES
        .iter()
        .any(|suffix| name.ends_with(suffix))
}

#[cfg(test)]
#[path = "../tests/path_tests.rs"]
mod path_tests;
