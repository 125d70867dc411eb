//! On-disk cache of compiled modules.
//!
//! Entries are keyed by a BLAKE3 hash of the source text, the instance's cache
//! identifier (compiler and options) and the request query, and stored as
//! gzip-compressed JSON.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedOutput {
    pub text: String,
    #[serde(default)]
    pub source_map: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn compute(source: &str, identifier: &str, query: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in [source, identifier, query] {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub trait OutputCache: Send + Sync {
    /// `None` on a miss or an unreadable entry.
    fn get(&self, key: &CacheKey) -> Option<CachedOutput>;

    fn put(&self, key: &CacheKey, output: &CachedOutput) -> io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FsOutputCache {
    dir: PathBuf,
}

impl FsOutputCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        let hex = key.as_str();
        self.dir.join(&hex[..2]).join(format!("{hex}.json.gz"))
    }

    fn read_entry(path: &Path) -> io::Result<CachedOutput> {
        let compressed = fs::read(path)?;
        let mut json = Vec::new();
        GzDecoder::new(compressed.as_slice()).read_to_end(&mut json)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

impl OutputCache for FsOutputCache {
    fn get(&self, key: &CacheKey) -> Option<CachedOutput> {
        let path = self.entry_path(key);
        match Self::read_entry(&path) {
            Ok(output) => {
                trace!(key = key.as_str(), "cache hit");
                Some(output)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "unreadable cache entry ignored");
                None
            }
        }
    }

    fn put(&self, key: &CacheKey, output: &CachedOutput) -> io::Result<()> {
        let path = self.entry_path(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_vec(output)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        let compressed = encoder.finish()?;

        // Readers never observe a partial entry.
        let partial = path.with_extension("partial");
        fs::write(&partial, compressed)?;
        fs::rename(&partial, &path)
    }
}

#[cfg(test)]
#[path = "../tests/cache_tests.rs"]
mod cache_tests;
