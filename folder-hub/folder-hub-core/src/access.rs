//! Access resolution for folders and files.
//!
//! Rules, first match wins:
//! 1. SUPERADMIN sees and manages everything.
//! 2. Anything inside a PERSONAL root belongs to the root's owner.
//! 3. The creator of a non-department folder has full access to it.
//! 4. Otherwise a grant decides: a direct grant on the node, else the grant
//!    on the nearest DEPARTMENT ancestor. WRITE is full access, READ is
//!    read-only, no grant is a denial.
//!
//! Department roots only ever open through a grant, and even a WRITE grant
//! does not allow deleting the department itself.

use crate::error::{Denial, Entity, HubError, HubResult};
use crate::model::{AccessType, Actor, File, Folder, FolderType};
use crate::store::Tables;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Access {
    pub can_read: bool,
    pub can_write: bool,
    pub can_delete: bool,
}

impl Access {
    pub const FULL: Access = Access {
        can_read: true,
        can_write: true,
        can_delete: true,
    };
    pub const READ_ONLY: Access = Access {
        can_read: true,
        can_write: false,
        can_delete: false,
    };

    pub fn require_read(self) -> HubResult<Self> {
        if self.can_read {
            Ok(self)
        } else {
            Err(HubError::AccessDenied(Denial::Generic))
        }
    }

    pub fn require_write(self) -> HubResult<Self> {
        if self.can_write {
            Ok(self)
        } else {
            Err(HubError::AccessDenied(Denial::Generic))
        }
    }

    pub fn require_delete(self) -> HubResult<Self> {
        if self.can_delete {
            Ok(self)
        } else {
            Err(HubError::AccessDenied(Denial::Generic))
        }
    }
}

/// Fail unless the actor is a SUPERADMIN.
pub fn require_admin(actor: &Actor) -> HubResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(HubError::AccessDenied(Denial::AdminRequired))
    }
}

/// Decide what `actor` may do with `folder`. Hidden folders, and anything
/// below a hidden folder, do not exist for anyone but an administrator.
pub fn resolve(tables: &Tables, actor: &Actor, folder: &Folder) -> HubResult<Access> {
    if actor.is_admin() {
        return Ok(Access::FULL);
    }
    let hidden_above = tables.ancestry(folder.id).iter().any(|f| !f.is_visible());
    if !folder.is_visible() || hidden_above {
        return Err(HubError::NotFound(Entity::Folder));
    }
    let owns = folder.created_by_id == actor.user_id;

    if let Some(root) = tables.root_of(folder.id) {
        if root.folder_type == FolderType::Personal {
            return if root.created_by_id == actor.user_id || owns {
                Ok(Access::FULL)
            } else {
                Err(HubError::AccessDenied(Denial::Generic))
            };
        }
    }

    if owns && folder.folder_type != FolderType::Department {
        return Ok(Access::FULL);
    }

    let grant = tables
        .grant_for(actor.user_id, folder.id)
        .or_else(|| {
            tables
                .nearest_department(folder.id)
                .and_then(|dept| tables.grant_for(actor.user_id, dept.id))
        });
    match grant.map(|g| g.access_type) {
        Some(AccessType::Write) if folder.folder_type == FolderType::Department => Ok(Access {
            can_read: true,
            can_write: true,
            can_delete: false,
        }),
        Some(AccessType::Write) => Ok(Access::FULL),
        Some(AccessType::Read) => Ok(Access::READ_ONLY),
        None if folder.folder_type == FolderType::Department => {
            Err(HubError::AccessDenied(Denial::Department))
        }
        None => Err(HubError::AccessDenied(Denial::Generic)),
    }
}

/// Files inherit their folder's decision; the creator of a file keeps full
/// control over it as long as the folder is readable.
pub fn resolve_file(tables: &Tables, actor: &Actor, file: &File) -> HubResult<Access> {
    if actor.is_admin() {
        return Ok(Access::FULL);
    }
    if !file.is_visible() {
        return Err(HubError::NotFound(Entity::File));
    }
    let folder = tables.require_folder(file.folder_id)?;
    let access = resolve(tables, actor, folder).map_err(|e| match e {
        HubError::NotFound(Entity::Folder) => HubError::NotFound(Entity::File),
        other => other,
    })?;
    if file.created_by_id == actor.user_id && access.can_read {
        return Ok(Access::FULL);
    }
    Ok(access)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Lifecycle, Role, UserId};
    use chrono::Utc;
    use uuid::Uuid;

    fn actor(role: Role) -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            email: "x@example.com".into(),
            role,
            is_active: true,
        }
    }

    fn add(t: &mut Tables, folder_type: FolderType, parent: Option<Uuid>, owner: UserId) -> Folder {
        let folder = Folder {
            id: Uuid::new_v4(),
            name: "n".into(),
            folder_type,
            parent_id: parent,
            created_by_id: owner,
            allowed_dept: None,
            lifecycle: Lifecycle::Active,
        };
        t.insert_folder(folder.clone()).unwrap();
        folder
    }

    #[test]
    fn admin_has_full_access_everywhere() {
        let mut t = Tables::default();
        let admin = actor(Role::Superadmin);
        let personal = add(&mut t, FolderType::Personal, None, Uuid::new_v4());
        assert_eq!(resolve(&t, &admin, &personal).unwrap(), Access::FULL);
    }

    #[test]
    fn personal_space_is_owner_only() {
        let mut t = Tables::default();
        let alice = actor(Role::Member);
        let bob = actor(Role::Member);
        let personal = add(&mut t, FolderType::Personal, None, alice.user_id);
        let inner = add(&mut t, FolderType::Project, Some(personal.id), Uuid::new_v4());

        assert_eq!(resolve(&t, &alice, &personal).unwrap(), Access::FULL);
        assert_eq!(resolve(&t, &alice, &inner).unwrap(), Access::FULL);
        assert_eq!(
            resolve(&t, &bob, &personal),
            Err(HubError::AccessDenied(Denial::Generic))
        );
    }

    #[test]
    fn department_requires_grant_even_for_creator() {
        let mut t = Tables::default();
        let member = actor(Role::Member);
        let dept = add(&mut t, FolderType::Department, None, member.user_id);
        assert_eq!(
            resolve(&t, &member, &dept),
            Err(HubError::AccessDenied(Denial::Department))
        );
    }

    #[test]
    fn grants_decide_under_departments() {
        let mut t = Tables::default();
        let admin = Uuid::new_v4();
        let writer = actor(Role::Member);
        let reader = actor(Role::Member);
        let stranger = actor(Role::Member);
        let dept = add(&mut t, FolderType::Department, None, admin);
        let project = add(&mut t, FolderType::Project, Some(dept.id), admin);
        t.upsert_grant(writer.user_id, dept.id, AccessType::Write).unwrap();
        t.upsert_grant(reader.user_id, dept.id, AccessType::Read).unwrap();

        assert_eq!(resolve(&t, &writer, &project).unwrap(), Access::FULL);
        let root = resolve(&t, &writer, &dept).unwrap();
        assert!(root.can_write && !root.can_delete);
        assert_eq!(resolve(&t, &reader, &project).unwrap(), Access::READ_ONLY);
        assert!(resolve(&t, &reader, &project).unwrap().require_write().is_err());
        assert_eq!(
            resolve(&t, &stranger, &project),
            Err(HubError::AccessDenied(Denial::Generic))
        );
        assert_eq!(
            resolve(&t, &stranger, &dept),
            Err(HubError::AccessDenied(Denial::Department))
        );
    }

    #[test]
    fn project_creator_keeps_access() {
        let mut t = Tables::default();
        let member = actor(Role::Member);
        let dept = add(&mut t, FolderType::Department, None, Uuid::new_v4());
        let project = add(&mut t, FolderType::Project, Some(dept.id), member.user_id);
        assert_eq!(resolve(&t, &member, &project).unwrap(), Access::FULL);
    }

    #[test]
    fn hidden_folders_are_not_found_for_members() {
        let mut t = Tables::default();
        let member = actor(Role::Member);
        let mut personal = add(&mut t, FolderType::Personal, None, member.user_id);
        personal.lifecycle = Lifecycle::SoftDeleted { at: Utc::now() };
        assert_eq!(
            resolve(&t, &member, &personal),
            Err(HubError::NotFound(Entity::Folder))
        );
        assert!(resolve(&t, &actor(Role::Superadmin), &personal).is_ok());
    }

    #[test]
    fn hidden_ancestors_hide_the_subtree() {
        let mut t = Tables::default();
        let admin = Uuid::new_v4();
        let writer = actor(Role::Member);
        let dept = add(&mut t, FolderType::Department, None, admin);
        let project = add(&mut t, FolderType::Project, Some(dept.id), admin);
        let inner = add(&mut t, FolderType::Project, Some(project.id), admin);
        t.upsert_grant(writer.user_id, dept.id, AccessType::Write).unwrap();
        assert_eq!(resolve(&t, &writer, &inner).unwrap(), Access::FULL);

        t.folder_mut(project.id).unwrap().lifecycle = Lifecycle::SoftDeleted { at: Utc::now() };
        assert_eq!(
            resolve(&t, &writer, &inner),
            Err(HubError::NotFound(Entity::Folder))
        );
        assert!(resolve(&t, &writer, &dept).is_ok());

        t.folder_mut(project.id).unwrap().lifecycle = Lifecycle::Active;
        t.folder_mut(dept.id).unwrap().lifecycle = Lifecycle::Disabled { since: Utc::now() };
        assert_eq!(
            resolve(&t, &writer, &project),
            Err(HubError::NotFound(Entity::Folder))
        );
        assert!(resolve(&t, &actor(Role::Superadmin), &inner).is_ok());
    }

    #[test]
    fn file_creator_keeps_control_with_read_grant() {
        let mut t = Tables::default();
        let reader = actor(Role::Member);
        let dept = add(&mut t, FolderType::Department, None, Uuid::new_v4());
        t.upsert_grant(reader.user_id, dept.id, AccessType::Read).unwrap();
        let own = File {
            id: Uuid::new_v4(),
            title: "mine".into(),
            folder_id: dept.id,
            created_by_id: reader.user_id,
            deleted_at: None,
        };
        let other = File {
            created_by_id: Uuid::new_v4(),
            id: Uuid::new_v4(),
            ..own.clone()
        };
        assert_eq!(resolve_file(&t, &reader, &own).unwrap(), Access::FULL);
        assert_eq!(resolve_file(&t, &reader, &other).unwrap(), Access::READ_ONLY);
    }
}
