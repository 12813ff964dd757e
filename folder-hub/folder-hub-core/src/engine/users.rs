use super::navigation::ensure_personal;
use super::{current_actor, Hub};
use crate::access::require_admin;
use crate::audit::AuditEvent;
use crate::error::{HubError, HubResult};
use crate::events::ChangeScope;
use crate::identity::{hash_password, verify_password};
use crate::model::{
    personal_folder_name, vault_folder_name, AccessType, Actor, FolderId, FolderType, Lifecycle,
    Role, User, UserId,
};
use crate::store::Tables;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_access() -> AccessType {
    AccessType::Write
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentGrant {
    pub folder_id: FolderId,
    #[serde(default = "default_access")]
    pub access: AccessType,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub password: String,
    #[serde(default = "NewUser::default_role")]
    pub role: Role,
    #[serde(default)]
    pub departments: Vec<DepartmentGrant>,
}

impl NewUser {
    fn default_role() -> Role {
        Role::Member
    }
}

/// Replace-all update of a user's role and department grants.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub role: Role,
    #[serde(default)]
    pub departments: Vec<DepartmentGrant>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRef {
    pub id: FolderId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_type: Option<AccessType>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub personal_folder_id: Option<FolderId>,
    pub departments: Vec<DepartmentRef>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserDirectory {
    pub authorized: bool,
    pub users: Vec<UserSummary>,
}

fn summarize(t: &Tables, user: &User) -> UserSummary {
    let mut departments: Vec<DepartmentRef> = t
        .grants_of(user.id)
        .into_iter()
        .filter_map(|g| {
            let folder = t.folder(g.folder_id)?;
            (folder.folder_type == FolderType::Department).then(|| DepartmentRef {
                id: folder.id,
                name: folder.name.clone(),
                access_type: Some(g.access_type),
            })
        })
        .collect();
    departments.sort_by(|a, b| a.name.cmp(&b.name));
    UserSummary {
        id: user.id,
        full_name: user.full_name.clone(),
        email: user.email.clone(),
        role: user.role,
        is_active: user.is_active(),
        deleted_at: user.deleted_at(),
        personal_folder_id: user.personal_folder_id,
        departments,
    }
}

/// Grants may only point at existing DEPARTMENT folders.
fn department_grants(
    t: &Tables,
    departments: &[DepartmentGrant],
) -> HubResult<Vec<(FolderId, AccessType)>> {
    departments
        .iter()
        .map(|d| {
            let folder = t.require_folder(d.folder_id)?;
            if folder.folder_type != FolderType::Department {
                return Err(HubError::invalid(format!(
                    "{} is not a department",
                    folder.name
                )));
            }
            Ok((d.folder_id, d.access))
        })
        .collect()
}

fn not_self(me: &Actor, target: UserId, what: &str) -> HubResult<()> {
    if me.user_id == target {
        return Err(HubError::invalid(format!("you cannot {} yourself", what)));
    }
    Ok(())
}

fn validate_identity(full_name: &str, email: &str) -> HubResult<()> {
    if full_name.trim().is_empty() {
        return Err(HubError::invalid("full name is required"));
    }
    if !email.contains('@') {
        return Err(HubError::invalid("a valid email is required"));
    }
    Ok(())
}

impl Hub {
    /// Create a user with a personal folder and the given department grants.
    pub async fn create_user(&self, actor: &Actor, input: NewUser) -> HubResult<UserSummary> {
        self.store
            .read(|t| require_admin(&current_actor(t, actor.user_id)?))
            .await?;
        validate_identity(&input.full_name, &input.email)?;
        if input.password.len() < 6 {
            return Err(HubError::invalid("password must have at least 6 characters"));
        }
        let password_hash = hash_password(&input.password)?;

        let summary = self
            .store
            .transaction(|t| {
                let me = current_actor(t, actor.user_id)?;
                require_admin(&me)?;
                let grants = department_grants(t, &input.departments)?;
                let user = User {
                    id: Uuid::new_v4(),
                    full_name: input.full_name.trim().to_string(),
                    email: input.email.trim().to_string(),
                    password_hash,
                    role: input.role,
                    lifecycle: Lifecycle::Active,
                    personal_folder_id: None,
                };
                let id = user.id;
                t.insert_user(user)?;
                ensure_personal(t, id)?;
                t.replace_department_grants(id, &grants)?;
                Ok(summarize(t, t.require_user(id)?))
            })
            .await?;

        tracing::info!(user = %summary.id, role = summary.role.as_str(), "user created");
        self.committed(
            Some(actor.user_id),
            summary.id,
            AuditEvent::CreateUser {
                email: summary.email.clone(),
                role: summary.role,
                departments: summary.departments.iter().map(|d| d.id).collect(),
            },
            ChangeScope::Users,
        );
        self.notifier.notify(ChangeScope::Tree);
        Ok(summary)
    }

    /// Set the user's role and replace all of their department grants.
    pub async fn update_user(
        &self,
        actor: &Actor,
        user_id: UserId,
        update: UserUpdate,
    ) -> HubResult<UserSummary> {
        let summary = self
            .store
            .transaction(|t| {
                let me = current_actor(t, actor.user_id)?;
                require_admin(&me)?;
                if me.user_id == user_id && update.role != Role::Superadmin {
                    return Err(HubError::invalid("you cannot remove your own administrator role"));
                }
                let grants = department_grants(t, &update.departments)?;
                t.user_mut(user_id)?.role = update.role;
                t.replace_department_grants(user_id, &grants)?;
                Ok(summarize(t, t.require_user(user_id)?))
            })
            .await?;
        self.committed(
            Some(actor.user_id),
            user_id,
            AuditEvent::UpdateUser {
                role: summary.role,
                departments: summary.departments.iter().map(|d| d.id).collect(),
            },
            ChangeScope::Users,
        );
        Ok(summary)
    }

    /// Flip a user between active and disabled. Returns the new `is_active`.
    pub async fn toggle_user_active(&self, actor: &Actor, user_id: UserId) -> HubResult<bool> {
        let (email, active) = self
            .store
            .transaction(|t| {
                let me = current_actor(t, actor.user_id)?;
                require_admin(&me)?;
                not_self(&me, user_id, "deactivate")?;
                let user = t.user_mut(user_id)?;
                if user.is_soft_deleted() {
                    return Err(HubError::invalid("user is deleted; restore it first"));
                }
                user.lifecycle = user.lifecycle.toggled(Utc::now());
                Ok((user.email.clone(), user.is_active()))
            })
            .await?;
        let event = if active {
            AuditEvent::ActivateUser { email }
        } else {
            AuditEvent::DeactivateUser { email }
        };
        self.committed(Some(actor.user_id), user_id, event, ChangeScope::Users);
        Ok(active)
    }

    /// Soft-delete a user and lock their personal folder away as a vault.
    pub async fn soft_delete_user(&self, actor: &Actor, user_id: UserId) -> HubResult<()> {
        let (email, vault) = self
            .store
            .transaction(|t| {
                let me = current_actor(t, actor.user_id)?;
                require_admin(&me)?;
                not_self(&me, user_id, "delete")?;
                let now = Utc::now();
                let user = t.user_mut(user_id)?;
                if user.is_soft_deleted() {
                    return Err(HubError::invalid("user is already deleted"));
                }
                user.lifecycle = Lifecycle::SoftDeleted { at: now };
                let full_name = user.full_name.clone();
                let email = user.email.clone();

                let vault = t.personal_folder_of(user_id).map(|f| f.id);
                if let Some(folder_id) = vault {
                    let folder = t.folder_mut(folder_id)?;
                    folder.name = vault_folder_name(&full_name);
                    folder.lifecycle = Lifecycle::Disabled { since: now };
                } else {
                    tracing::warn!(user = %user_id, "deleted user had no personal folder");
                }
                Ok((email, vault))
            })
            .await?;
        tracing::info!(user = %user_id, "user soft-deleted");
        self.committed(
            Some(actor.user_id),
            user_id,
            AuditEvent::SoftDeleteUser {
                email,
                vault_folder_id: vault,
            },
            ChangeScope::Users,
        );
        self.notifier.notify(ChangeScope::Tree);
        Ok(())
    }

    /// Undo a soft delete: the user is active again and the vault goes back
    /// to being the visible personal area.
    pub async fn restore_user(&self, actor: &Actor, user_id: UserId) -> HubResult<()> {
        let email = self
            .store
            .transaction(|t| {
                let me = current_actor(t, actor.user_id)?;
                require_admin(&me)?;
                let user = t.user_mut(user_id)?;
                user.lifecycle = user
                    .lifecycle
                    .restored()
                    .ok_or_else(|| HubError::invalid("user is not deleted"))?;
                let full_name = user.full_name.clone();
                let email = user.email.clone();

                let (folder_id, _) = ensure_personal(t, user_id)?;
                let folder = t.folder_mut(folder_id)?;
                folder.name = personal_folder_name(&full_name);
                folder.lifecycle = Lifecycle::Active;
                Ok(email)
            })
            .await?;
        tracing::info!(user = %user_id, "user restored");
        self.committed(
            Some(actor.user_id),
            user_id,
            AuditEvent::RestoreUser { email },
            ChangeScope::Users,
        );
        self.notifier.notify(ChangeScope::Tree);
        Ok(())
    }

    /// Permanently remove a soft-deleted user.
    ///
    /// In one transaction: the user's grants, personal folder, every
    /// non-department folder they created (with its subtree) and every file
    /// they created are removed. Departments they created are handed to the
    /// acting admin. Audit records stay.
    pub async fn hard_delete_user(&self, actor: &Actor, user_id: UserId) -> HubResult<()> {
        let (email, folders_removed, files_removed, departments_reassigned) = self
            .store
            .transaction(|t| {
                let me = current_actor(t, actor.user_id)?;
                require_admin(&me)?;
                not_self(&me, user_id, "delete")?;
                let user = t.require_user(user_id)?;
                if !user.is_soft_deleted() {
                    return Err(HubError::invalid("only deleted users can be purged"));
                }
                let email = user.email.clone();

                t.remove_grants_of(user_id);

                let departments: Vec<FolderId> = t
                    .folders()
                    .filter(|f| {
                        f.created_by_id == user_id && f.folder_type == FolderType::Department
                    })
                    .map(|f| f.id)
                    .collect();
                for id in &departments {
                    t.folder_mut(*id)?.created_by_id = me.user_id;
                }

                let owned: Vec<FolderId> = t
                    .folders()
                    .filter(|f| f.created_by_id == user_id)
                    .map(|f| f.id)
                    .collect();
                let (mut folders_removed, mut files_removed) = (0, 0);
                for id in owned {
                    // an earlier subtree may already have taken this one
                    let (folders, files) = t.remove_subtree(id);
                    folders_removed += folders;
                    files_removed += files;
                }
                for id in t.files_created_by(user_id) {
                    if t.remove_file(id).is_some() {
                        files_removed += 1;
                    }
                }

                t.remove_user(user_id);
                Ok((email, folders_removed, files_removed, departments.len()))
            })
            .await?;
        tracing::info!(
            user = %user_id,
            folders_removed,
            files_removed,
            departments_reassigned,
            "user purged"
        );
        self.committed(
            Some(actor.user_id),
            user_id,
            AuditEvent::HardDeleteUser {
                email,
                folders_removed,
                files_removed,
                departments_reassigned,
            },
            ChangeScope::Users,
        );
        self.notifier.notify(ChangeScope::Tree);
        Ok(())
    }

    /// Directory of every user ordered by name. Non-admins get an empty,
    /// unauthorized directory rather than an error.
    pub async fn list_users(&self, actor: &Actor) -> HubResult<UserDirectory> {
        self.store
            .read(|t| {
                let me = current_actor(t, actor.user_id)?;
                if require_admin(&me).is_err() {
                    return Ok(UserDirectory {
                        authorized: false,
                        users: Vec::new(),
                    });
                }
                let mut users: Vec<UserSummary> = t.users().map(|u| summarize(t, u)).collect();
                users.sort_by(|a, b| a.full_name.cmp(&b.full_name));
                Ok(UserDirectory {
                    authorized: true,
                    users,
                })
            })
            .await
    }

    /// Every non-deleted department, ordered by name.
    pub async fn list_departments(&self, actor: &Actor) -> HubResult<Vec<DepartmentRef>> {
        self.store
            .read(|t| {
                current_actor(t, actor.user_id)?;
                let mut departments: Vec<DepartmentRef> = t
                    .folders()
                    .filter(|f| f.folder_type == FolderType::Department && f.deleted_at().is_none())
                    .map(|f| DepartmentRef {
                        id: f.id,
                        name: f.name.clone(),
                        access_type: None,
                    })
                    .collect();
                departments.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(departments)
            })
            .await
    }

    /// Check an email/password pair. Every failure is `Unauthenticated`
    /// without saying which half was wrong.
    pub async fn authenticate(&self, email: &str, password: &str) -> HubResult<Actor> {
        let (user_id, hash) = self
            .store
            .read(|t| {
                let user = t
                    .user_by_email(email.trim())
                    .filter(|u| u.is_active())
                    .ok_or(HubError::Unauthenticated)?;
                Ok((user.id, user.password_hash.clone()))
            })
            .await?;
        if !verify_password(password, &hash) {
            tracing::debug!(user = %user_id, "password rejected");
            return Err(HubError::Unauthenticated);
        }
        self.identify(user_id).await
    }

    /// Create the first SUPERADMIN. Does nothing when one already exists and
    /// returns that admin's id instead.
    pub async fn bootstrap_admin(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> HubResult<UserId> {
        validate_identity(full_name, email)?;
        let existing = self
            .store
            .read(|t| Ok(t.first_superadmin().map(|u| u.id)))
            .await?;
        if let Some(id) = existing {
            return Ok(id);
        }
        let password_hash = hash_password(password)?;
        let (id, created) = self
            .store
            .transaction(|t| {
                if let Some(admin) = t.first_superadmin() {
                    return Ok((admin.id, false));
                }
                let user = User {
                    id: Uuid::new_v4(),
                    full_name: full_name.trim().to_string(),
                    email: email.trim().to_string(),
                    password_hash,
                    role: Role::Superadmin,
                    lifecycle: Lifecycle::Active,
                    personal_folder_id: None,
                };
                let id = user.id;
                t.insert_user(user)?;
                ensure_personal(t, id)?;
                Ok((id, true))
            })
            .await?;
        if created {
            tracing::info!(user = %id, "administrator bootstrapped");
            self.committed(
                None,
                id,
                AuditEvent::BootstrapAdmin {
                    email: email.trim().to_string(),
                },
                ChangeScope::Users,
            );
        }
        Ok(id)
    }
}
