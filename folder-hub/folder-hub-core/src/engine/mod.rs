//! The hub: access checks, folder and user lifecycles, audit queries.
//!
//! Every mutation follows the same shape: validate and write inside one
//! store transaction, then hand an event to the audit recorder and a
//! change hint to the notifier. Neither of the last two can fail the
//! operation.

mod folders;
mod navigation;
mod users;

pub use navigation::{CurrentFolder, FolderListing, ListTarget, ListedFolder};
pub use users::{DepartmentGrant, DepartmentRef, NewUser, UserDirectory, UserSummary, UserUpdate};

use crate::access::require_admin;
use crate::audit::{AuditEvent, AuditJournal, AuditRecord, AuditRecorder};
use crate::config::HubConfig;
use crate::error::{Envelope, HubError, HubResult};
use crate::events::{ChangeNotifier, ChangeScope};
use crate::model::{Actor, UserId};
use crate::store::{HubStore, Tables};
use serde::Serialize;
use std::sync::Arc;

pub struct Hub {
    store: Arc<HubStore>,
    audit: AuditRecorder,
    notifier: ChangeNotifier,
    config: HubConfig,
}

/// Audit record joined with its actor's display data.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    #[serde(flatten)]
    pub record: AuditRecord,
    pub user: Option<AuditUser>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuditUser {
    pub full_name: String,
    pub email: String,
}

impl Hub {
    /// Open the store and audit journal described by `config` and start the
    /// audit writer. Must be called inside a Tokio runtime.
    pub async fn open(config: HubConfig) -> anyhow::Result<Self> {
        let store = Arc::new(HubStore::open(&config)?);
        let journal = match config.audit_log_path() {
            Some(path) => AuditJournal::open(&path)?,
            None => AuditJournal::in_memory(),
        };
        let audit = AuditRecorder::spawn(Arc::new(journal), config.audit_queue_capacity);
        tracing::info!(data_dir = ?config.data_dir, "hub opened");
        Ok(Self {
            store,
            audit,
            notifier: ChangeNotifier::new(),
            config,
        })
    }

    pub async fn in_memory() -> anyhow::Result<Self> {
        Self::open(HubConfig::in_memory()).await
    }

    pub fn store(&self) -> &HubStore {
        &self.store
    }

    pub fn audit(&self) -> &AuditRecorder {
        &self.audit
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Resolve a user id into an actor. Unknown, disabled and deleted users
    /// are not valid callers.
    pub async fn identify(&self, user_id: UserId) -> HubResult<Actor> {
        self.store
            .read(|t| current_actor(t, user_id))
            .await
    }

    /// Last audit records, newest first. Anyone but a SUPERADMIN gets an
    /// empty list, not an error.
    pub async fn audit_logs(&self, actor: &Actor) -> HubResult<Vec<AuditEntry>> {
        let limit = self.config.audit_query_limit;
        let journal = Arc::clone(self.audit.journal());
        self.store
            .read(|t| {
                let authorized = current_actor(t, actor.user_id)
                    .and_then(|a| require_admin(&a))
                    .is_ok();
                if !authorized {
                    return Ok(Vec::new());
                }
                let entries = journal
                    .recent(limit)
                    .into_iter()
                    .map(|record| {
                        let user = record.user_id.and_then(|id| t.user(id)).map(|u| AuditUser {
                            full_name: u.full_name.clone(),
                            email: u.email.clone(),
                        });
                        AuditEntry { record, user }
                    })
                    .collect();
                Ok(entries)
            })
            .await
    }

    fn committed(
        &self,
        actor: Option<UserId>,
        entity: impl ToString,
        event: AuditEvent,
        scope: ChangeScope,
    ) {
        self.audit.record(actor, Some(entity.to_string()), event);
        self.notifier.notify(scope);
    }
}

/// Re-read the caller from the user table so a stale actor (demoted,
/// disabled, deleted) fails closed.
pub(crate) fn current_actor(tables: &Tables, user_id: UserId) -> HubResult<Actor> {
    match tables.user(user_id) {
        Some(user) if user.is_active() => Ok(user.actor()),
        _ => Err(HubError::Unauthenticated),
    }
}

/// Convert an operation result into the boundary envelope, logging store
/// failures with their full context.
pub fn envelope<T>(operation: &str, res: HubResult<T>) -> Envelope<T> {
    match &res {
        Err(HubError::StoreFailure(detail)) => {
            tracing::error!(operation, %detail, "store failure");
        }
        Err(e) => {
            tracing::debug!(operation, error = %e, "operation rejected");
        }
        Ok(_) => {}
    }
    res.into()
}
