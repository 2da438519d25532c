use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::debug;

use crate::error::CacheError;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long to wait for another process to finish with a mirror.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(600);

/// Exclusive advisory lock on one cache entry, held while the mirror is
/// created or fetched. Released on drop, including on error paths.
#[derive(Debug)]
pub struct MirrorLock {
    file: File,
    path: PathBuf,
}

impl MirrorLock {
    /// Lock file path for a mirror directory: `<mirror>.lock` alongside it.
    pub fn path_for(mirror_dir: &Path) -> PathBuf {
        let mut name = mirror_dir
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        mirror_dir.with_file_name(name)
    }

    pub fn acquire(mirror_dir: &Path) -> Result<Self, CacheError> {
        Self::acquire_with_timeout(mirror_dir, DEFAULT_LOCK_TIMEOUT)
    }

    pub fn acquire_with_timeout(mirror_dir: &Path, timeout: Duration) -> Result<Self, CacheError> {
        let path = Self::path_for(mirror_dir);
        let lock_err = |reason: String| CacheError::Lock {
            path: path.clone(),
            reason,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| lock_err(e.to_string()))?;
        }
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| lock_err(e.to_string()))?;

        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(_) if started.elapsed() < timeout => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    return Err(lock_err(format!(
                        "still held after {}s ({e})",
                        timeout.as_secs()
                    )))
                }
            }
        }

        debug!(lock = %path.display(), "Acquired mirror lock");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MirrorLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!(lock = %self.path.display(), "Released mirror lock");
    }
}
