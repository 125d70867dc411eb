use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tsz_common::normalize_path;
use tsz_incremental::FileSystem;

#[derive(Debug, Default)]
struct Inner {
    files: FxHashMap<PathBuf, String>,
    reads: FxHashMap<PathBuf, usize>,
}

/// In-memory file system that records every `read_to_string`.
///
/// Clones share the same files, so a test can keep a handle while the
/// compilation state owns another.
#[derive(Debug, Clone, Default)]
pub struct CountingFileSystem {
    inner: Arc<Mutex<Inner>>,
}

impl CountingFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
        self.write(path, text);
        self
    }

    pub fn write(&self, path: impl AsRef<Path>, text: impl Into<String>) {
        self.inner
            .lock()
            .files
            .insert(normalize_path(path.as_ref()), text.into());
    }

    pub fn delete(&self, path: impl AsRef<Path>) {
        self.inner.lock().files.remove(&normalize_path(path.as_ref()));
    }

    /// Reads of `path` so far.
    pub fn reads_of(&self, path: impl AsRef<Path>) -> usize {
        self.inner
            .lock()
            .reads
            .get(&normalize_path(path.as_ref()))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_reads(&self) -> usize {
        self.inner.lock().reads.values().sum()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.inner.lock().files.contains_key(&normalize_path(path))
    }
}

impl FileSystem for CountingFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let path = normalize_path(path);
        let mut inner = self.inner.lock();
        *inner.reads.entry(path.clone()).or_default() += 1;
        inner.files.get(&path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.contains(path)
    }
}
