//! C2 — Atomic Store.
//!
//! Read, mutate-under-lock, atomically replace JSON documents. Every
//! domain store (session, task, context, ...) composes this rather than
//! touching `std::fs` directly, so the write path — temp file, `fsync`,
//! rename over target — only needs to be right once.

use fs2::FileExt;
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(PathBuf),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt document at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("lock not acquired for {path} within {0:?}", .timeout)]
    LockTimeout { path: PathBuf, timeout: Duration },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Default deadline for advisory lock acquisition.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_RETRY_INITIAL: Duration = Duration::from_millis(5);
const LOCK_RETRY_MAX: Duration = Duration::from_millis(200);

/// A zero-state handle onto the temp-then-rename / advisory-lock primitives.
/// All paths are absolute and supplied per call; nothing here is mutable
/// shared state, so a single `AtomicStore` can be cloned/shared freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicStore {
    lock_timeout: Duration,
}

impl AtomicStore {
    pub fn new() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self { lock_timeout }
    }

    /// Read raw bytes, or `NotFound`.
    pub fn read(&self, path: &Path) -> StoreResult<Vec<u8>> {
        fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(path.to_path_buf())
            } else {
                StoreError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })
    }

    /// Read and parse a JSON document, or `NotFound`.
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> StoreResult<T> {
        let bytes = self.read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Read and parse a JSON document if it exists, `None` if not.
    pub fn read_json_opt<T: DeserializeOwned>(&self, path: &Path) -> StoreResult<Option<T>> {
        match self.read_json(path) {
            Ok(v) => Ok(Some(v)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write bytes atomically: temp file in the same directory, `sync_all`,
    /// then rename over the target. Creates the containing directory if
    /// missing.
    pub fn write_atomic(&self, path: &Path, bytes: &[u8]) -> StoreResult<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| StoreError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        use std::io::Write;
        tmp.write_all(bytes).map_err(|e| StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        tmp.as_file().sync_all().map_err(|e| StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        tmp.persist(path).map_err(|e| StoreError::Io {
            path: path.to_path_buf(),
            source: e.error,
        })?;
        Ok(())
    }

    /// Serialize pretty (two-space indent) and write
    /// atomically.
    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.write_atomic(path, &bytes)
    }

    /// Acquire an advisory exclusive lock on `path`'s sibling `.lock` file,
    /// run `f`, then release. Retries with bounded backoff until
    /// `self.lock_timeout` elapses.
    pub fn with_lock<T>(
        &self,
        path: &Path,
        f: impl FnOnce() -> StoreResult<T>,
    ) -> StoreResult<T> {
        let lock_path = lock_path_for(path);
        if let Some(dir) = lock_path.parent() {
            fs::create_dir_all(dir).map_err(|e| StoreError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }
        let file = File::create(&lock_path).map_err(|e| StoreError::Io {
            path: lock_path.clone(),
            source: e,
        })?;

        let start = Instant::now();
        let mut backoff = LOCK_RETRY_INITIAL;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(_) if start.elapsed() >= self.lock_timeout => {
                    return Err(StoreError::LockTimeout {
                        path: path.to_path_buf(),
                        timeout: self.lock_timeout,
                    })
                }
                Err(_) => {
                    std::thread::sleep(backoff.min(self.lock_timeout - start.elapsed()));
                    backoff = (backoff * 2).min(LOCK_RETRY_MAX);
                }
            }
        }

        let result = f();
        let _ = fs2::FileExt::unlock(&file);
        result
    }

    /// lock -> read -> parse -> mutate -> serialize -> write -> unlock.
    /// `mutator` receives `None` if the document did not yet exist.
    pub fn update<T, F>(&self, path: &Path, mutator: F) -> StoreResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> StoreResult<T>,
    {
        self.with_lock(path, || {
            let current = self.read_json_opt::<T>(path)?;
            let updated = mutator(current)?;
            self.write_json(path, &updated)?;
            Ok(updated)
        })
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Doc {
        n: u32,
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let store = AtomicStore::new();

        store.write_json(&path, &Doc { n: 1 }).unwrap();
        let read: Doc = store.read_json(&path).unwrap();
        assert_eq!(read, Doc { n: 1 });
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let store = AtomicStore::new();
        let err = store.read_json::<Doc>(&path).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn corrupt_json_is_surfaced_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = AtomicStore::new();
        let err = store.read_json::<Doc>(&path).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));

        // The file on disk is untouched.
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes, b"{not json");
    }

    #[test]
    fn update_creates_and_then_mutates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let store = AtomicStore::new();

        store
            .update::<Doc, _>(&path, |existing| {
                assert!(existing.is_none());
                Ok(Doc { n: 1 })
            })
            .unwrap();

        let updated = store
            .update::<Doc, _>(&path, |existing| {
                let mut d = existing.unwrap();
                d.n += 1;
                Ok(d)
            })
            .unwrap();
        assert_eq!(updated, Doc { n: 2 });
    }

    #[test]
    fn lock_excludes_concurrent_writers() {
        use std::sync::Arc;
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        let path = Arc::new(dir.path().join("counter.json"));
        let store = AtomicStore::new();
        store.write_json(path.as_path(), &Doc { n: 0 }).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let path = Arc::clone(&path);
            let store = store;
            handles.push(thread::spawn(move || {
                store
                    .update::<Doc, _>(&path, |existing| {
                        let mut d = existing.unwrap();
                        d.n += 1;
                        Ok(d)
                    })
                    .unwrap();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let result: Doc = store.read_json(path.as_path()).unwrap();
        assert_eq!(result.n, 8);
    }
}
