use super::{current_actor, Hub};
use crate::access::{require_admin, resolve, Access};
use crate::error::HubResult;
use crate::events::ChangeScope;
use crate::model::{
    personal_folder_name, Actor, File, Folder, FolderId, FolderType, Lifecycle, UserId,
};
use crate::store::Tables;
use serde::Serialize;
use uuid::Uuid;

pub const PERSONAL_SPACES_KEY: &str = "SUPER_PERSONAL_ROOT";
pub const DEPARTMENTS_KEY: &str = "ADMIN_ROOT";

/// What to list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListTarget {
    /// The caller's personal folder, created on first access.
    MySpace,
    /// Every user's personal folder (SUPERADMIN only).
    AllPersonal,
    /// Every department (SUPERADMIN only).
    AllDepartments,
    Folder(FolderId),
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum CurrentFolder {
    Folder(Folder),
    #[serde(rename_all = "camelCase")]
    Synthetic {
        id: &'static str,
        name: &'static str,
        parent_id: Option<FolderId>,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct ListedFolder {
    #[serde(flatten)]
    pub folder: Folder,
    pub label: String,
}

impl ListedFolder {
    fn plain(folder: &Folder) -> Self {
        Self {
            label: folder.name.clone(),
            folder: folder.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderListing {
    pub current: CurrentFolder,
    pub access: Access,
    pub subfolders: Vec<ListedFolder>,
    pub files: Vec<File>,
}

impl Hub {
    pub async fn list_children(
        &self,
        actor: &Actor,
        target: ListTarget,
    ) -> HubResult<FolderListing> {
        match target {
            ListTarget::MySpace => {
                let existing = self
                    .store
                    .read(|t| {
                        let me = current_actor(t, actor.user_id)?;
                        Ok(linked_personal_folder(t, me.user_id))
                    })
                    .await?;
                let folder_id = match existing {
                    Some(id) => id,
                    None => self.ensure_personal_folder(actor).await?,
                };
                self.store
                    .read(|t| list_folder(t, &current_actor(t, actor.user_id)?, folder_id))
                    .await
            }
            ListTarget::AllPersonal => {
                self.store
                    .read(|t| {
                        require_admin(&current_actor(t, actor.user_id)?)?;
                        let mut subfolders: Vec<ListedFolder> = t
                            .folders()
                            .filter(|f| f.folder_type == FolderType::Personal && f.is_visible())
                            .map(|f| {
                                let owner = t
                                    .user(f.created_by_id)
                                    .map(|u| u.full_name.as_str())
                                    .unwrap_or("User");
                                ListedFolder {
                                    label: format!("{} | {}", owner, f.name),
                                    folder: f.clone(),
                                }
                            })
                            .collect();
                        subfolders.sort_by(|a, b| a.folder.name.cmp(&b.folder.name));
                        Ok(FolderListing {
                            current: CurrentFolder::Synthetic {
                                id: PERSONAL_SPACES_KEY,
                                name: "Everyone's personal spaces",
                                parent_id: None,
                            },
                            access: Access::FULL,
                            subfolders,
                            files: Vec::new(),
                        })
                    })
                    .await
            }
            ListTarget::AllDepartments => {
                self.store
                    .read(|t| {
                        require_admin(&current_actor(t, actor.user_id)?)?;
                        let mut subfolders: Vec<ListedFolder> = t
                            .folders()
                            .filter(|f| {
                                f.folder_type == FolderType::Department
                                    && f.deleted_at().is_none()
                            })
                            .map(ListedFolder::plain)
                            .collect();
                        subfolders.sort_by(|a, b| a.folder.name.cmp(&b.folder.name));
                        Ok(FolderListing {
                            current: CurrentFolder::Synthetic {
                                id: DEPARTMENTS_KEY,
                                name: "Global management",
                                parent_id: None,
                            },
                            access: Access::FULL,
                            subfolders,
                            files: Vec::new(),
                        })
                    })
                    .await
            }
            ListTarget::Folder(id) => {
                self.store
                    .read(|t| list_folder(t, &current_actor(t, actor.user_id)?, id))
                    .await
            }
        }
    }

    /// Return the caller's personal folder, creating and linking it if it
    /// does not exist yet. Safe to call concurrently: creation happens inside
    /// a write transaction and the table refuses a second PERSONAL folder.
    pub async fn ensure_personal_folder(&self, actor: &Actor) -> HubResult<FolderId> {
        let (id, created) = self
            .store
            .transaction(|t| {
                let me = current_actor(t, actor.user_id)?;
                ensure_personal(t, me.user_id)
            })
            .await?;
        if created {
            tracing::info!(user = %actor.user_id, folder = %id, "personal folder provisioned");
            self.notifier.notify(ChangeScope::Tree);
        }
        Ok(id)
    }

    /// Whether `actor` may be told about a change under `scope`.
    pub async fn can_observe(&self, actor: &Actor, scope: &ChangeScope) -> bool {
        self.store
            .read(|t| {
                let me = current_actor(t, actor.user_id)?;
                match scope {
                    ChangeScope::Tree => Ok(()),
                    ChangeScope::Users => require_admin(&me),
                    ChangeScope::Folder(id) => {
                        resolve(t, &me, t.require_folder(*id)?)?.require_read()?;
                        Ok(())
                    }
                }
            })
            .await
            .is_ok()
    }
}

fn linked_personal_folder(t: &Tables, user: UserId) -> Option<FolderId> {
    let linked = t.user(user)?.personal_folder_id?;
    t.folder(linked)
        .filter(|f| f.folder_type == FolderType::Personal && f.created_by_id == user)
        .map(|f| f.id)
}

/// Link (or create and link) the user's PERSONAL folder. Returns the folder
/// id and whether a folder had to be created.
pub(crate) fn ensure_personal(t: &mut Tables, user: UserId) -> HubResult<(FolderId, bool)> {
    if let Some(id) = linked_personal_folder(t, user) {
        return Ok((id, false));
    }
    if let Some(existing) = t.personal_folder_of(user).map(|f| f.id) {
        t.user_mut(user)?.personal_folder_id = Some(existing);
        return Ok((existing, false));
    }
    let full_name = t.require_user(user)?.full_name.clone();
    let folder = Folder {
        id: Uuid::new_v4(),
        name: personal_folder_name(&full_name),
        folder_type: FolderType::Personal,
        parent_id: None,
        created_by_id: user,
        allowed_dept: None,
        lifecycle: Lifecycle::Active,
    };
    let id = folder.id;
    t.insert_folder(folder)?;
    t.user_mut(user)?.personal_folder_id = Some(id);
    Ok((id, true))
}

fn list_folder(t: &Tables, actor: &Actor, id: FolderId) -> HubResult<FolderListing> {
    let folder = t.require_folder(id)?;
    let access = resolve(t, actor, folder)?.require_read()?;

    let mut subfolders: Vec<ListedFolder> = t
        .child_folders(id)
        .into_iter()
        .filter(|f| f.is_visible())
        .map(ListedFolder::plain)
        .collect();
    subfolders.sort_by(|a, b| a.folder.name.cmp(&b.folder.name));

    let mut files: Vec<File> = t
        .files_in(id)
        .into_iter()
        .filter(|f| f.is_visible())
        .cloned()
        .collect();
    files.sort_by(|a, b| a.title.cmp(&b.title));

    Ok(FolderListing {
        current: CurrentFolder::Folder(folder.clone()),
        access,
        subfolders,
        files,
    })
}
