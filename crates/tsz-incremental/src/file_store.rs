//! Versioned in-memory source text.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};
use tsz_common::{PathCase, PathKey, normalize_path};

/// One source file as the compiler sees it.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    text: Arc<str>,
    version: u64,
}

impl SourceFile {
    /// Normalized path as last spelled by a caller.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Shared immutable view handed to the oracle.
    pub fn snapshot(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }
}

/// Source text keyed by [`PathKey`].
///
/// `project_version` moves on structural changes only; `generation` moves on
/// every change, content included. Together they key the cached program.
#[derive(Debug)]
pub struct FileStore {
    case: PathCase,
    files: FxHashMap<PathKey, SourceFile>,
    project_version: u64,
    generation: u64,
}

impl FileStore {
    pub fn new(case: PathCase) -> Self {
        Self {
            case,
            files: FxHashMap::default(),
            project_version: 0,
            generation: 0,
        }
    }

    pub fn case(&self) -> PathCase {
        self.case
    }

    pub fn key(&self, path: &Path) -> PathKey {
        self.case.key(path)
    }

    /// Insert unconditionally at version 0. Used for library and bootstrap
    /// files whose content is known up front.
    pub fn add_file(&mut self, path: &Path, text: impl Into<Arc<str>>) {
        let path = normalize_path(path);
        let key = self.key(&path);
        debug!(file = %path.display(), "add file");
        self.files.insert(
            key,
            SourceFile {
                path,
                text: text.into(),
                version: 0,
            },
        );
        self.project_version += 1;
        self.generation += 1;
    }

    /// Store new content for `path`.
    ///
    /// Returns `true` when the file was inserted or its version bumped. With
    /// `checked` set, identical content is a no-op returning `false`.
    pub fn update_file(&mut self, path: &Path, text: &str, checked: bool) -> bool {
        let path = normalize_path(path);
        let key = self.key(&path);

        let Some(existing_path) = self.files.get(&key).map(|f| f.path.clone()) else {
            self.add_file(&path, text);
            return true;
        };

        if existing_path != path {
            // Same key, different spelling: only possible on a
            // case-insensitive store.
            self.rename_file(&existing_path, &path);
        }

        let Some(file) = self.files.get_mut(&key) else {
            return false;
        };
        if checked && &*file.text == text {
            trace!(file = %path.display(), version = file.version, "content unchanged");
            return false;
        }

        file.text = Arc::from(text);
        file.version += 1;
        self.generation += 1;
        trace!(file = %path.display(), version = file.version, "file updated");
        true
    }

    pub fn has_file(&self, path: &Path) -> bool {
        self.files.contains_key(&self.key(path))
    }

    pub fn get_file(&self, path: &Path) -> Option<&SourceFile> {
        self.files.get(&self.key(path))
    }

    pub fn remove_file(&mut self, path: &Path) -> Option<SourceFile> {
        let removed = self.files.remove(&self.key(path));
        if removed.is_some() {
            debug!(file = %path.display(), "remove file");
            self.project_version += 1;
            self.generation += 1;
        }
        removed
    }

    /// Move an entry to a new path, keeping its text and version.
    ///
    /// This is the only way an entry changes identity. A rename that lands on
    /// the same key (a case-only rename on a case-insensitive store) just
    /// updates the spelling. Both bump the project version.
    pub fn rename_file(&mut self, from: &Path, to: &Path) -> bool {
        let from_key = self.key(from);
        let Some(mut file) = self.files.remove(&from_key) else {
            return false;
        };
        let to = normalize_path(to);
        debug!(
            from = %file.path.display(),
            to = %to.display(),
            version = file.version,
            "rename file"
        );
        file.path = to;
        let to_key = self.key(&file.path);
        self.files.insert(to_key, file);
        self.project_version += 1;
        self.generation += 1;
        true
    }

    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.files.values().map(|f| f.path.clone()).collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn project_version(&self) -> u64 {
        self.project_version
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
#[path = "../tests/file_store_tests.rs"]
mod file_store_tests;
