//! Transactional table store backing the hub.
//!
//! All rows live in [`Tables`]. A transaction runs against a draft copy of
//! the tables and is only swapped in once the closure and the on-disk
//! snapshot both succeed, so a failed operation never leaves partial
//! writes behind. Writers are serialized by the lock, which is what makes
//! the cycle check in `move` and the personal-folder uniqueness guard safe
//! under concurrent callers.

mod grants;
mod hierarchy;
mod users;

use crate::config::HubConfig;
use crate::error::{HubError, HubResult};
use crate::model::{AccessGrant, File, FileId, Folder, FolderId, User, UserId};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// The relational state of the hub: one map per table, keyed by row id.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Tables {
    users: HashMap<UserId, User>,
    folders: HashMap<FolderId, Folder>,
    files: HashMap<FileId, File>,
    grants: HashMap<Uuid, AccessGrant>,
}

pub struct HubStore {
    tables: RwLock<Tables>,
    snapshot: Option<PathBuf>,
    timeout: Duration,
}

impl HubStore {
    /// Open the store, loading `hub.json` from the data directory when present.
    pub fn open(config: &HubConfig) -> Result<Self> {
        let snapshot = config.snapshot_path();
        let tables = match &snapshot {
            Some(path) => {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)?;
                }
                if path.exists() {
                    let data = std::fs::read_to_string(path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    serde_json::from_str(&data)
                        .with_context(|| format!("parsing {}", path.display()))?
                } else {
                    Tables::default()
                }
            }
            None => Tables::default(),
        };
        Ok(Self {
            tables: RwLock::new(tables),
            snapshot,
            timeout: config.store_timeout,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            snapshot: None,
            timeout: HubConfig::default().store_timeout,
        }
    }

    /// Run a read-only closure against the committed tables.
    pub async fn read<T>(&self, f: impl FnOnce(&Tables) -> HubResult<T>) -> HubResult<T> {
        let guard = tokio::time::timeout(self.timeout, self.tables.read())
            .await
            .map_err(|_| HubError::store("timed out waiting for a read lock"))?;
        f(&guard)
    }

    /// Run a mutating closure. Either every change it makes is committed or
    /// none is.
    pub async fn transaction<T>(
        &self,
        f: impl FnOnce(&mut Tables) -> HubResult<T>,
    ) -> HubResult<T> {
        let mut guard = tokio::time::timeout(self.timeout, self.tables.write())
            .await
            .map_err(|_| HubError::store("timed out waiting for a write lock"))?;
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        if let Some(path) = &self.snapshot {
            write_snapshot(path, &draft)?;
        }
        *guard = draft;
        Ok(out)
    }
}

fn write_snapshot(path: &Path, tables: &Tables) -> HubResult<()> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec(tables)?;
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
