// src/pipeline/dest.rs

//! Writing pipeline outputs.
//!
//! Outputs are only written when their bytes changed since the last write of
//! the same path. Unchanged rewrites would otherwise look like fresh
//! artifacts to the watcher and restart the supervised server for nothing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use blake3::Hash;
use tracing::{debug, trace};

use crate::fs::FileSystem;
use crate::pipeline::{FileError, FileRecord};

/// Stage name used for write failures.
pub const DEST_STAGE: &str = "dest";

/// Content hashes of the last bytes written per output path.
#[derive(Debug, Default)]
pub struct WriteCache {
    hashes: Mutex<HashMap<PathBuf, Hash>>,
}

impl WriteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every cached output under `prefix` (e.g. after a clean).
    pub fn invalidate_under(&self, prefix: &Path) {
        let mut hashes = self.lock();
        let before = hashes.len();
        hashes.retain(|path, _| !path.starts_with(prefix));
        debug!(prefix = ?prefix, dropped = before - hashes.len(), "invalidated write cache");
    }

    fn is_current(&self, fs: &dyn FileSystem, path: &Path, hash: &Hash) -> bool {
        self.lock().get(path) == Some(hash) && fs.is_file(path)
    }

    fn record(&self, path: PathBuf, hash: Hash) {
        self.lock().insert(path, hash);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Hash>> {
        self.hashes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Result of writing one batch of outputs.
#[derive(Debug, Default)]
pub struct WriteOutcome {
    pub written: Vec<PathBuf>,
    pub unchanged: usize,
    pub errors: Vec<FileError>,
}

/// Write `files` below `dest`, skipping outputs whose bytes are unchanged.
pub fn write_outputs(
    fs: &dyn FileSystem,
    dest: &Path,
    files: Vec<FileRecord>,
    cache: &WriteCache,
) -> WriteOutcome {
    let mut outcome = WriteOutcome::default();

    for file in files {
        let path = dest.join(&file.relative);
        let hash = blake3::hash(&file.contents);

        if cache.is_current(fs, &path, &hash) {
            trace!(path = ?path, "output unchanged; skipping write");
            outcome.unchanged += 1;
            continue;
        }

        match fs.write(&path, &file.contents) {
            Ok(()) => {
                cache.record(path.clone(), hash);
                outcome.written.push(path);
            }
            Err(e) => outcome.errors.push(FileError {
                stage: DEST_STAGE.to_string(),
                path: file.source,
                message: format!("{e:#}"),
            }),
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn bundle(contents: &str) -> Vec<FileRecord> {
        vec![FileRecord::new("app.js", "app.js", contents)]
    }

    #[test]
    fn identical_rewrite_is_skipped() {
        let fs = MockFileSystem::new();
        let cache = WriteCache::new();
        let dest = Path::new("./static/dist");

        let first = write_outputs(&fs, dest, bundle("x"), &cache);
        assert_eq!(first.written, vec![PathBuf::from("./static/dist/app.js")]);

        let second = write_outputs(&fs, dest, bundle("x"), &cache);
        assert!(second.written.is_empty());
        assert_eq!(second.unchanged, 1);

        let third = write_outputs(&fs, dest, bundle("y"), &cache);
        assert_eq!(third.written.len(), 1);
        assert_eq!(fs.contents("./static/dist/app.js"), Some(b"y".to_vec()));
    }

    #[test]
    fn removed_output_is_rewritten() {
        let fs = MockFileSystem::new();
        let cache = WriteCache::new();
        let dest = Path::new("./static/dist");

        write_outputs(&fs, dest, bundle("x"), &cache);
        fs.remove_dir_all(dest).unwrap();

        let again = write_outputs(&fs, dest, bundle("x"), &cache);
        assert_eq!(again.written.len(), 1);
    }
}
