//! Rows owned by the hierarchy, grant and user tables.
//!
//! Visibility of users and folders is carried by a single [`Lifecycle`]
//! value. The `is_active` / `deleted_at` pair exposed to callers is derived
//! from it, so the two can never drift apart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
pub type FolderId = Uuid;
pub type FileId = Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Member,
    Superadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "MEMBER",
            Role::Superadmin => "SUPERADMIN",
        }
    }
}

/// Kind of folder. PERSONAL and DEPARTMENT folders are roots, PROJECT
/// folders always live under another folder.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FolderType {
    Personal,
    Department,
    Project,
}

impl FolderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FolderType::Personal => "PERSONAL",
            FolderType::Department => "DEPARTMENT",
            FolderType::Project => "PROJECT",
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, FolderType::Personal | FolderType::Department)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessType {
    Read,
    Write,
}

/// Visibility state shared by users and folders.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Lifecycle {
    Active,
    /// Switched off by an administrator.
    Disabled { since: DateTime<Utc> },
    /// Deleted but still stored.
    SoftDeleted { at: DateTime<Utc> },
}

impl Lifecycle {
    pub fn is_visible(&self) -> bool {
        matches!(self, Lifecycle::Active)
    }

    /// `None` unless currently active.
    pub fn soft_deleted(self, at: DateTime<Utc>) -> Option<Lifecycle> {
        match self {
            Lifecycle::Active => Some(Lifecycle::SoftDeleted { at }),
            _ => None,
        }
    }

    /// Administrator switch: disabled comes back, anything else goes off.
    pub fn toggled(self, now: DateTime<Utc>) -> Lifecycle {
        match self {
            Lifecycle::Disabled { .. } => Lifecycle::Active,
            _ => Lifecycle::Disabled { since: now },
        }
    }

    /// `None` unless currently soft-deleted.
    pub fn restored(self) -> Option<Lifecycle> {
        match self {
            Lifecycle::SoftDeleted { .. } => Some(Lifecycle::Active),
            _ => None,
        }
    }
}

/// Authenticated caller of a core operation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Superadmin
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub lifecycle: Lifecycle,
    pub personal_folder_id: Option<FolderId>,
}

impl User {
    /// Toggling a user off does not delete it, so only soft delete sets a
    /// deletion timestamp.
    pub fn is_active(&self) -> bool {
        self.lifecycle.is_visible()
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self.lifecycle {
            Lifecycle::SoftDeleted { at } => Some(at),
            _ => None,
        }
    }

    pub fn is_soft_deleted(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::SoftDeleted { .. })
    }

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.id,
            email: self.email.clone(),
            role: self.role,
            is_active: self.is_active(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(into = "FolderRecord", from = "FolderRecord")]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    pub folder_type: FolderType,
    pub parent_id: Option<FolderId>,
    pub created_by_id: UserId,
    pub allowed_dept: Option<String>,
    pub lifecycle: Lifecycle,
}

/// Serialized form of a folder. `isActive` and `deletedAt` are written for
/// readers and ignored on the way back in.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FolderRecord {
    id: FolderId,
    name: String,
    #[serde(rename = "type")]
    folder_type: FolderType,
    parent_id: Option<FolderId>,
    created_by_id: UserId,
    allowed_dept: Option<String>,
    lifecycle: Lifecycle,
    #[serde(default)]
    is_active: bool,
    #[serde(default)]
    deleted_at: Option<DateTime<Utc>>,
}

impl From<Folder> for FolderRecord {
    fn from(f: Folder) -> Self {
        Self {
            is_active: f.is_active(),
            deleted_at: f.deleted_at(),
            id: f.id,
            name: f.name,
            folder_type: f.folder_type,
            parent_id: f.parent_id,
            created_by_id: f.created_by_id,
            allowed_dept: f.allowed_dept,
            lifecycle: f.lifecycle,
        }
    }
}

impl From<FolderRecord> for Folder {
    fn from(r: FolderRecord) -> Self {
        Self {
            id: r.id,
            name: r.name,
            folder_type: r.folder_type,
            parent_id: r.parent_id,
            created_by_id: r.created_by_id,
            allowed_dept: r.allowed_dept,
            lifecycle: r.lifecycle,
        }
    }
}

impl Folder {
    /// A soft-deleted folder keeps `is_active`; only an administrator
    /// switch clears it.
    pub fn is_active(&self) -> bool {
        !matches!(self.lifecycle, Lifecycle::Disabled { .. })
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self.lifecycle {
            Lifecycle::Active => None,
            Lifecycle::Disabled { since } => Some(since),
            Lifecycle::SoftDeleted { at } => Some(at),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.lifecycle.is_visible()
    }
}

/// Content leaf stored inside a folder.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub id: FileId,
    pub title: String,
    pub folder_id: FolderId,
    pub created_by_id: UserId,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl File {
    pub fn is_visible(&self) -> bool {
        self.deleted_at.is_none()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub id: Uuid,
    pub user_id: UserId,
    pub folder_id: FolderId,
    pub access_type: AccessType,
}

/// Folder or file addressed by a rename / move / delete.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Folder,
    File,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Folder => "folder",
            ItemKind::File => "file",
        }
    }
}

pub fn personal_folder_name(full_name: &str) -> String {
    format!("Personal area of {}", full_name)
}

pub fn vault_folder_name(full_name: &str) -> String {
    format!("VAULT | {} (deleted user)", full_name)
}
