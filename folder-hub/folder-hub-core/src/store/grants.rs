//! Access grant rows: one grant per (user, folder) pair.

use super::Tables;
use crate::error::HubResult;
use crate::model::{AccessGrant, AccessType, FolderId, FolderType, UserId};
use uuid::Uuid;

impl Tables {
    pub fn grant_for(&self, user: UserId, folder: FolderId) -> Option<&AccessGrant> {
        self.grants
            .values()
            .find(|g| g.user_id == user && g.folder_id == folder)
    }

    pub fn grants_of(&self, user: UserId) -> Vec<&AccessGrant> {
        self.grants.values().filter(|g| g.user_id == user).collect()
    }

    /// Insert a grant, replacing any existing grant for the same pair.
    pub fn upsert_grant(
        &mut self,
        user: UserId,
        folder: FolderId,
        access_type: AccessType,
    ) -> HubResult<Uuid> {
        self.require_folder(folder)?;
        if let Some(existing) = self
            .grants
            .values_mut()
            .find(|g| g.user_id == user && g.folder_id == folder)
        {
            existing.access_type = access_type;
            return Ok(existing.id);
        }
        let id = Uuid::new_v4();
        self.grants.insert(
            id,
            AccessGrant {
                id,
                user_id: user,
                folder_id: folder,
                access_type,
            },
        );
        Ok(id)
    }

    /// Drop every grant the user holds on a DEPARTMENT folder and insert the
    /// given ones. Grants on other folder types are left alone.
    pub fn replace_department_grants(
        &mut self,
        user: UserId,
        grants: &[(FolderId, AccessType)],
    ) -> HubResult<()> {
        let department_ids: Vec<FolderId> = self
            .folders
            .values()
            .filter(|f| f.folder_type == FolderType::Department)
            .map(|f| f.id)
            .collect();
        self.grants
            .retain(|_, g| !(g.user_id == user && department_ids.contains(&g.folder_id)));
        for (folder, access) in grants {
            self.upsert_grant(user, *folder, *access)?;
        }
        Ok(())
    }

    pub fn remove_grants_of(&mut self, user: UserId) -> usize {
        let before = self.grants.len();
        self.grants.retain(|_, g| g.user_id != user);
        before - self.grants.len()
    }
}
