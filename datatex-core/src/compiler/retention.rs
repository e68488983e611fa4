use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;
use tempfile::TempDir;

use crate::config::RetentionPolicy;

/// Prefix of every per-compile working directory.
pub const WORK_DIR_PREFIX: &str = "datatex-";

/// Working directories of compiles that are still running. Pruning never
/// removes or counts them.
#[derive(Debug, Default)]
pub(super) struct InFlight {
    dirs: Mutex<HashSet<PathBuf>>,
}

impl InFlight {
    /// Create a fresh working directory under `work_root`, registered as in use
    /// until the returned [`WorkDir`] is finished or dropped.
    pub(super) fn create(&self, work_root: &Path) -> io::Result<WorkDir<'_>> {
        // Held across creation so a concurrent prune never sees the directory
        // on disk before it is registered.
        let mut dirs = self.dirs.lock();
        let dir = tempfile::Builder::new()
            .prefix(WORK_DIR_PREFIX)
            .tempdir_in(work_root)?;
        dirs.insert(dir.path().to_path_buf());
        Ok(WorkDir {
            dir: Some(dir),
            in_flight: self,
        })
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.dirs.lock().len()
    }
}

/// A registered working directory. Dropping it unregisters and deletes it.
pub(super) struct WorkDir<'a> {
    dir: Option<TempDir>,
    in_flight: &'a InFlight,
}

impl WorkDir<'_> {
    pub(super) fn path(&self) -> &Path {
        match &self.dir {
            Some(dir) => dir.path(),
            None => Path::new(""),
        }
    }

    /// Unregister the directory and apply `policy` to it.
    pub(super) fn finish(
        mut self,
        policy: RetentionPolicy,
        work_root: &Path,
        succeeded: bool,
    ) -> Option<PathBuf> {
        let dir = self.dir.take()?;
        let mut active = self.in_flight.dirs.lock();
        active.remove(dir.path());
        finish(dir, policy, work_root, succeeded, &active)
    }
}

impl Drop for WorkDir<'_> {
    fn drop(&mut self) {
        if let Some(dir) = &self.dir {
            self.in_flight.dirs.lock().remove(dir.path());
        }
    }
}

/// Keep or delete a finished compile's working directory. Returns the path
/// when the directory survives.
fn finish(
    dir: TempDir,
    policy: RetentionPolicy,
    work_root: &Path,
    succeeded: bool,
    active: &HashSet<PathBuf>,
) -> Option<PathBuf> {
    match policy {
        RetentionPolicy::KeepAll => Some(dir.keep()),
        RetentionPolicy::KeepFailures if !succeeded => {
            let path = dir.keep();
            tracing::info!("Keeping failed compile directory {}", path.display());
            Some(path)
        }
        RetentionPolicy::KeepFailures | RetentionPolicy::KeepNone => {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::warn!("Failed to remove {}: {}", path.display(), e);
            }
            None
        }
        RetentionPolicy::KeepLast(n) => {
            let path = dir.keep();
            prune(work_root, n, active);
            path.exists().then_some(path)
        }
    }
}

/// Delete all but the `keep` most recently modified finished working
/// directories. Directories in `active` belong to running compiles and are
/// skipped.
fn prune(work_root: &Path, keep: usize, active: &HashSet<PathBuf>) -> usize {
    let entries = match std::fs::read_dir(work_root) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Cannot scan {}: {}", work_root.display(), e);
            return 0;
        }
    };

    let mut dirs: Vec<(SystemTime, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_name().to_string_lossy().starts_with(WORK_DIR_PREFIX)
                && entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
                && !active.contains(&entry.path())
        })
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, entry.path())
        })
        .collect();

    // Newest first
    dirs.sort_by(|a, b| b.0.cmp(&a.0));

    let mut removed = 0;
    for (_, path) in dirs.into_iter().skip(keep) {
        match std::fs::remove_dir_all(&path) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
    if removed > 0 {
        tracing::debug!("Pruned {} old compile directories", removed);
    }
    removed
}
