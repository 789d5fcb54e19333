//! Rolling file backups, created just before a document save replaces its
//! source file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

/// Backup behavior, projected from the config document's `tag_backup`
/// block.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupPolicy {
    /// Backup directory name. Relative names resolve next to the source
    /// file; absolute paths are used as-is.
    pub folder_basename: PathBuf,
    /// Rolling backups kept per file. Zero disables backups entirely.
    pub max_count: u32,
    /// Minimum time between backups of one file.
    pub interval: Duration,
    /// Whether the caller should surface a notification for new backups.
    pub notify: bool,
}

impl Default for BackupPolicy {
    fn default() -> Self {
        Self {
            folder_basename: PathBuf::from("backup"),
            max_count: 3,
            interval: Duration::from_secs(300),
            notify: false,
        }
    }
}

fn read_only(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem
    )
}

impl BackupPolicy {
    fn backup_dir(&self, source: &Path) -> PathBuf {
        if self.folder_basename.is_absolute() {
            self.folder_basename.clone()
        } else {
            source
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(&self.folder_basename)
        }
    }

    fn slot(&self, source: &Path, index: u32) -> PathBuf {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        self.backup_dir(source).join(format!("{}.{}", name, index))
    }

    /// Copies the current contents of `source` into the rolling backup
    /// set, honoring the interval gate and the count cap.
    ///
    /// Returns the created backup path, or `None` when no backup was made.
    /// Read-only storage is skipped silently; every other I/O failure
    /// propagates.
    pub fn maybe_back_up(&self, source: &Path) -> std::io::Result<Option<PathBuf>> {
        if self.max_count == 0 || !source.exists() {
            return Ok(None);
        }

        // Interval gate: the newest backup's mtime decides.
        let newest = self.slot(source, 0);
        if let Ok(meta) = fs::metadata(&newest) {
            if let Ok(modified) = meta.modified() {
                if modified
                    .elapsed()
                    .map(|age| age < self.interval)
                    .unwrap_or(false)
                {
                    return Ok(None);
                }
            }
        }

        let dir = self.backup_dir(source);
        if let Err(err) = fs::create_dir_all(&dir) {
            if read_only(&err) {
                debug!(dir = %dir.display(), "backup skipped: storage is read-only");
                return Ok(None);
            }
            return Err(err);
        }

        // Rotate: the oldest slot falls off the end.
        let _ = fs::remove_file(self.slot(source, self.max_count - 1));
        for index in (0..self.max_count - 1).rev() {
            let _ = fs::rename(self.slot(source, index), self.slot(source, index + 1));
        }

        match fs::copy(source, &newest) {
            Ok(_) => {
                info!(backup = %newest.display(), "backup created");
                Ok(Some(newest))
            }
            Err(err) if read_only(&err) => {
                debug!(source = %source.display(), "backup skipped: storage is read-only");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn policy(interval: Duration) -> BackupPolicy {
        BackupPolicy {
            max_count: 2,
            interval,
            ..BackupPolicy::default()
        }
    }

    #[test]
    fn creates_and_rotates_backups() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("prefs.cfg");
        let policy = policy(Duration::ZERO);

        fs::write(&source, b"one").unwrap();
        let first = policy.maybe_back_up(&source).unwrap().unwrap();
        assert_eq!(fs::read(&first).unwrap(), b"one");

        fs::write(&source, b"two").unwrap();
        policy.maybe_back_up(&source).unwrap().unwrap();
        fs::write(&source, b"three").unwrap();
        policy.maybe_back_up(&source).unwrap().unwrap();

        // Capped at two slots; newest first.
        let slot0 = policy.slot(&source, 0);
        let slot1 = policy.slot(&source, 1);
        assert_eq!(fs::read(&slot0).unwrap(), b"three");
        assert_eq!(fs::read(&slot1).unwrap(), b"two");
        assert!(!policy.slot(&source, 2).exists());
    }

    #[test]
    fn interval_gates_repeat_backups() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("prefs.cfg");
        let policy = policy(Duration::from_secs(3600));

        fs::write(&source, b"one").unwrap();
        assert!(policy.maybe_back_up(&source).unwrap().is_some());
        fs::write(&source, b"two").unwrap();
        // Within the hour: skipped.
        assert!(policy.maybe_back_up(&source).unwrap().is_none());
        assert_eq!(fs::read(policy.slot(&source, 0)).unwrap(), b"one");
    }

    #[test]
    fn zero_count_disables_backups() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("prefs.cfg");
        fs::write(&source, b"x").unwrap();
        let policy = BackupPolicy {
            max_count: 0,
            ..BackupPolicy::default()
        };
        assert!(policy.maybe_back_up(&source).unwrap().is_none());
    }

    #[test]
    fn missing_source_is_a_no_op() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("never-written.cfg");
        assert!(policy(Duration::ZERO).maybe_back_up(&source).unwrap().is_none());
    }
}
