//! Snapshot files
//!
//! `backboard sync --output` writes everything ingestion collected as JSON so
//! the board can be served or inspected without touching git or GitHub.

use crate::model::Repo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub repos: Vec<Repo>,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot version {found} (expected {})", SNAPSHOT_VERSION)]
    UnsupportedVersion { found: u32 },
}

pub type Result<T> = std::result::Result<T, SnapshotError>;

impl Snapshot {
    pub fn new(repos: Vec<Repo>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            generated_at: Utc::now(),
            repos,
        }
    }

    /// Load a snapshot from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.version,
            });
        }
        Ok(snapshot)
    }

    /// Write the snapshot atomically: to a sibling temp file, then rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}
