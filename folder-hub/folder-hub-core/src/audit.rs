//! Append-only audit trail.
//!
//! Mutations hand a typed [`AuditEvent`] to the [`AuditRecorder`], which only
//! enqueues it. A background task appends the record to the
//! [`AuditJournal`], an in-memory list mirrored to a checksummed log file.
//! Nothing on this path can fail the mutation that produced the event:
//! every failure ends in a log line.

use crate::model::{FolderType, ItemKind, Role, UserId};
use anyhow::{anyhow, Result};
use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

const MAGIC: &[u8] = b"FHAUDIT1";

/// One variant per audited action, each with its own details record.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(
    tag = "action",
    content = "details",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum AuditEvent {
    CreateFolder {
        name: String,
        parent_id: Uuid,
    },
    CreateDepartment {
        name: String,
    },
    CreateFile {
        title: String,
        folder_id: Uuid,
    },
    RenameItem {
        item_type: ItemKind,
        old_name: String,
        new_name: String,
    },
    MoveItem {
        item_type: ItemKind,
        destination: String,
        destination_id: Uuid,
    },
    SoftDeleteItem {
        item_type: ItemKind,
        name: String,
    },
    ActivateFolder {
        name: String,
        #[serde(rename = "type")]
        folder_type: FolderType,
    },
    DeactivateFolder {
        name: String,
        #[serde(rename = "type")]
        folder_type: FolderType,
    },
    CreateUser {
        email: String,
        role: Role,
        departments: Vec<Uuid>,
    },
    UpdateUser {
        role: Role,
        departments: Vec<Uuid>,
    },
    ActivateUser {
        email: String,
    },
    DeactivateUser {
        email: String,
    },
    SoftDeleteUser {
        email: String,
        vault_folder_id: Option<Uuid>,
    },
    RestoreUser {
        email: String,
    },
    HardDeleteUser {
        email: String,
        folders_removed: usize,
        files_removed: usize,
        departments_reassigned: usize,
    },
    BootstrapAdmin {
        email: String,
    },
}

/// Persisted audit row.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: Uuid,
    pub user_id: Option<UserId>,
    pub action: String,
    pub entity_id: Option<String>,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        actor: Option<UserId>,
        entity_id: Option<String>,
        event: &AuditEvent,
    ) -> Result<Self> {
        let mut tagged = serde_json::to_value(event)?;
        let action = tagged
            .get("action")
            .and_then(|a| a.as_str())
            .ok_or_else(|| anyhow!("audit event without action"))?
            .to_string();
        let details = tagged
            .get_mut("details")
            .map(serde_json::Value::take)
            .unwrap_or_else(|| serde_json::json!({}));
        Ok(Self {
            id: Uuid::new_v4(),
            user_id: actor,
            action,
            entity_id,
            details,
            timestamp: Utc::now(),
        })
    }
}

struct JournalInner {
    records: Vec<AuditRecord>,
    file: Option<File>,
}

/// Append-only store of audit records.
pub struct AuditJournal {
    inner: Mutex<JournalInner>,
}

impl AuditJournal {
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(JournalInner {
                records: Vec::new(),
                file: None,
            }),
        }
    }

    /// Open (or create) the journal file and replay it. A torn or corrupt
    /// tail ends the replay and is cut off; earlier records are kept.
    pub fn open(path: &Path) -> Result<Self> {
        let mut records = Vec::new();
        let mut valid_len = 0u64;
        if path.exists() {
            let existing = File::open(path)?;
            let total = existing.metadata()?.len();
            let mut reader = BufReader::new(existing);
            let mut magic = [0u8; 8];
            if reader.read_exact(&mut magic).is_ok() {
                if magic != MAGIC {
                    return Err(anyhow!("invalid audit journal {}", path.display()));
                }
                valid_len = MAGIC.len() as u64;
                while let Ok((record, size)) =
                    Self::decode_record(&mut reader, total - valid_len)
                {
                    records.push(record);
                    valid_len += size;
                }
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let on_disk = file.metadata()?.len();
        if valid_len == 0 {
            file.set_len(0)?;
            file.write_all(MAGIC)?;
            file.sync_data()?;
        } else if on_disk > valid_len {
            tracing::warn!(
                path = %path.display(),
                dropped = on_disk - valid_len,
                "truncating torn audit journal tail"
            );
            file.set_len(valid_len)?;
            file.sync_data()?;
        }
        Ok(Self {
            inner: Mutex::new(JournalInner {
                records,
                file: Some(file),
            }),
        })
    }

    pub fn append(&self, record: AuditRecord) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(file) = inner.file.as_mut() {
            let encoded = Self::encode_record(&record)?;
            file.write_all(&encoded)?;
            file.sync_data()?;
        }
        inner.records.push(record);
        Ok(())
    }

    /// Most recent records first, at most `limit` of them.
    pub fn recent(&self, limit: usize) -> Vec<AuditRecord> {
        let inner = self.inner.lock();
        let mut out: Vec<AuditRecord> = inner.records.iter().rev().cloned().collect();
        // stable: equal timestamps keep newest-appended first
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out.truncate(limit);
        out
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn encode_record(record: &AuditRecord) -> Result<Vec<u8>> {
        let payload = serde_json::to_vec(record)?;
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&payload);
        let mut buf = BytesMut::with_capacity(payload.len() + 8);
        buf.put_u32_le(payload.len() as u32);
        buf.put_u32_le(hasher.finalize());
        buf.put_slice(&payload);
        Ok(buf.to_vec())
    }

    /// Read one record; `remaining` is the number of unread bytes in the file.
    fn decode_record(reader: &mut impl Read, remaining: u64) -> Result<(AuditRecord, u64)> {
        let mut header = [0u8; 8];
        reader.read_exact(&mut header)?;
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if len as u64 > remaining.saturating_sub(8) {
            return Err(anyhow!("audit record length {} exceeds the journal", len));
        }
        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload)?;
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&payload);
        if hasher.finalize() != crc {
            return Err(anyhow!("audit record checksum mismatch"));
        }
        Ok((serde_json::from_slice(&payload)?, 8 + len as u64))
    }
}

enum Command {
    Record(AuditRecord),
    Flush(oneshot::Sender<()>),
}

/// Enqueue-and-forget front of the audit journal.
#[derive(Clone)]
pub struct AuditRecorder {
    tx: mpsc::Sender<Command>,
    journal: Arc<AuditJournal>,
}

impl AuditRecorder {
    /// Start the writer task. Must be called inside a Tokio runtime.
    pub fn spawn(journal: Arc<AuditJournal>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel(capacity.max(1));
        let writer = Arc::clone(&journal);
        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    Command::Record(record) => {
                        let action = record.action.clone();
                        if let Err(e) = writer.append(record) {
                            tracing::warn!(%action, error = %e, "audit append failed");
                        }
                    }
                    Command::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });
        Self { tx, journal }
    }

    /// Record an event. Never fails and never waits on the journal.
    pub fn record(&self, actor: Option<UserId>, entity_id: Option<String>, event: AuditEvent) {
        let record = match AuditRecord::new(actor, entity_id, &event) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, ?event, "audit record could not be built");
                return;
            }
        };
        if let Err(e) = self.tx.try_send(Command::Record(record)) {
            tracing::warn!(error = %e, "audit record dropped");
        }
    }

    /// Wait until every record enqueued before this call has been written.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Command::Flush(done)).await.is_ok() {
            let _ = wait.await;
        }
    }

    pub fn journal(&self) -> &Arc<AuditJournal> {
        &self.journal
    }
}
