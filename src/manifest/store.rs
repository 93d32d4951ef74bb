//! Manifest Store - load/save with migration and automatic backup
//!
//! Load failures degrade to "no manifest" (fail-open, logged) so a corrupt
//! or unreadable baseline never blocks scanning; save and backup failures
//! propagate, since a silently failed save would defeat the integrity
//! guarantee.
//!
//! Writes are last-write-wins with no internal locking. Concurrent
//! invocations against the same data directory must be serialized by the
//! embedding host; this is a documented contract, not an enforced one.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use super::backup::{BackupError, BackupManager};
use super::{decode_manifest, DecodedManifest, Manifest};

/// Manifest filename within the data directory.
pub const MANIFEST_FILE: &str = "manifest.json";

const BACKUP_SUBDIR: &str = "backups";

/// Fatal store failures. Load-side problems are not here: they degrade to
/// an absent manifest.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize manifest: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Backup(#[from] BackupError),
}

/// Persisted manifest storage rooted at a data directory.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    data_dir: PathBuf,
    manifest_path: PathBuf,
    backups: BackupManager,
}

impl ManifestStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let manifest_path = data_dir.join(MANIFEST_FILE);
        let backups = BackupManager::new(data_dir.join(BACKUP_SUBDIR));
        Self {
            data_dir,
            manifest_path,
            backups,
        }
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Load the manifest, if one exists.
    ///
    /// A legacy-shaped manifest is upgraded and immediately re-persisted;
    /// re-loading an already-migrated manifest is a migration no-op.
    /// Unreadable or unrecognizable content is logged and treated as
    /// absent rather than raised.
    pub fn load(&self) -> Result<Option<Manifest>, StoreError> {
        let content = match fs::read_to_string(&self.manifest_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!(
                    path = %self.manifest_path.display(),
                    error = %e,
                    "manifest unreadable, treating as absent"
                );
                return Ok(None);
            }
        };

        let value: Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    path = %self.manifest_path.display(),
                    error = %e,
                    "manifest is not valid JSON, treating as absent"
                );
                return Ok(None);
            }
        };

        match decode_manifest(value) {
            Some(DecodedManifest::Current(manifest)) => Ok(Some(manifest)),
            Some(DecodedManifest::Upgraded(manifest)) => {
                info!(
                    path = %self.manifest_path.display(),
                    "upgraded legacy single-collection manifest"
                );
                self.save(&manifest)?;
                Ok(Some(manifest))
            }
            None => {
                warn!(
                    path = %self.manifest_path.display(),
                    "unrecognized manifest shape, treating as absent"
                );
                Ok(None)
            }
        }
    }

    /// Persist the manifest, snapshotting any existing content first.
    pub fn save(&self, manifest: &Manifest) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir).map_err(|source| StoreError::Io {
            path: self.data_dir.display().to_string(),
            source,
        })?;

        self.backups.backup(&self.manifest_path)?;

        let content =
            serde_json::to_string_pretty(manifest).map_err(|source| StoreError::Serialize { source })?;
        fs::write(&self.manifest_path, content).map_err(|source| StoreError::Io {
            path: self.manifest_path.display().to_string(),
            source,
        })?;
        Ok(())
    }
}
