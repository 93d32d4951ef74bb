//! Backup/Rollback Manager
//!
//! Snapshots the manifest before every overwrite, keeps the most recent
//! snapshots by capture timestamp, and can restore any retained snapshot.
//! A rollback first snapshots the state it is about to overwrite, so
//! rollbacks are themselves reversible.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Number of snapshots retained; older ones are pruned oldest-first.
pub const BACKUP_RETENTION: usize = 10;

const BACKUP_PREFIX: &str = "manifest-";
const BACKUP_SUFFIX: &str = ".json";

/// Failures from backup and rollback operations.
///
/// Absence conditions (`NoBackups`, `NotFound`) are distinct from I/O
/// errors, which are fatal.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("no backups available")]
    NoBackups,

    #[error("no backup found for timestamp {timestamp}")]
    NotFound { timestamp: i64 },

    #[error("backup I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> BackupError + '_ {
    move |source| BackupError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// A single retained snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    /// Capture time in milliseconds since the epoch (embedded in the filename).
    pub timestamp: i64,
    /// Snapshot file path.
    pub path: PathBuf,
    /// Capture time as RFC 3339 for display.
    pub iso_date: String,
}

impl BackupRecord {
    fn new(timestamp: i64, path: PathBuf) -> Self {
        let iso_date = DateTime::<Utc>::from_timestamp_millis(timestamp)
            .map(|d| d.to_rfc3339())
            .unwrap_or_default();
        Self {
            timestamp,
            path,
            iso_date,
        }
    }
}

/// Result of a completed rollback.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackOutcome {
    /// The snapshot that was restored.
    pub restored_from: BackupRecord,
    /// Snapshot taken of the manifest that the rollback overwrote, if one
    /// existed.
    pub superseded: Option<BackupRecord>,
}

/// Manages timestamped manifest snapshots under a dedicated directory.
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_dir: PathBuf,
}

impl BackupManager {
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Snapshot the current manifest file verbatim.
    ///
    /// Returns `None` when there is no manifest to snapshot. Prunes
    /// snapshots beyond the retention count afterwards.
    pub fn backup(&self, manifest_path: &Path) -> Result<Option<BackupRecord>, BackupError> {
        if !manifest_path.exists() {
            return Ok(None);
        }
        fs::create_dir_all(&self.backup_dir).map_err(io_err(&self.backup_dir))?;

        let mut timestamp = Utc::now().timestamp_millis();
        // Keep timestamps strictly increasing across same-millisecond captures.
        if let Some(latest) = self.list()?.first() {
            if timestamp <= latest.timestamp {
                timestamp = latest.timestamp + 1;
            }
        }
        let path = self.backup_path(timestamp);

        fs::copy(manifest_path, &path).map_err(io_err(&path))?;
        self.prune()?;
        Ok(Some(BackupRecord::new(timestamp, path)))
    }

    /// All retained snapshots, newest first.
    pub fn list(&self) -> Result<Vec<BackupRecord>, BackupError> {
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.backup_dir)(e)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_err(&self.backup_dir))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(timestamp) = parse_backup_name(name) else {
                continue;
            };
            records.push(BackupRecord::new(timestamp, entry.path()));
        }

        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    /// Restore a snapshot over the manifest.
    ///
    /// Without a timestamp the most recent snapshot is restored; with one,
    /// an exact match is required. The overwritten state is snapshotted
    /// first.
    pub fn rollback(
        &self,
        manifest_path: &Path,
        timestamp: Option<i64>,
    ) -> Result<RollbackOutcome, BackupError> {
        let backups = self.list()?;
        if backups.is_empty() {
            return Err(BackupError::NoBackups);
        }

        let restored_from = match timestamp {
            Some(ts) => backups
                .iter()
                .find(|b| b.timestamp == ts)
                .cloned()
                .ok_or(BackupError::NotFound { timestamp: ts })?,
            None => backups[0].clone(),
        };

        // Read the snapshot before taking a new backup: the pre-rollback
        // snapshot may prune the very file being restored.
        let content = fs::read(&restored_from.path).map_err(io_err(&restored_from.path))?;

        let superseded = self.backup(manifest_path)?;

        if let Some(parent) = manifest_path.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        fs::write(manifest_path, content).map_err(io_err(manifest_path))?;

        Ok(RollbackOutcome {
            restored_from,
            superseded,
        })
    }

    fn backup_path(&self, timestamp: i64) -> PathBuf {
        self.backup_dir
            .join(format!("{BACKUP_PREFIX}{timestamp}{BACKUP_SUFFIX}"))
    }

    fn prune(&self) -> Result<(), BackupError> {
        let backups = self.list()?;
        for stale in backups.iter().skip(BACKUP_RETENTION) {
            debug!(path = %stale.path.display(), "pruning stale backup");
            fs::remove_file(&stale.path).map_err(io_err(&stale.path))?;
        }
        Ok(())
    }
}

fn parse_backup_name(name: &str) -> Option<i64> {
    name.strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(BACKUP_SUFFIX)?
        .parse()
        .ok()
}
