use super::{current_actor, Hub};
use crate::access::{require_admin, resolve, resolve_file};
use crate::audit::AuditEvent;
use crate::error::{HubError, HubResult};
use crate::events::ChangeScope;
use crate::model::{Actor, File, FileId, Folder, FolderId, FolderType, ItemKind, Lifecycle};
use chrono::Utc;
use uuid::Uuid;

fn clean_name(name: &str) -> HubResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(HubError::invalid("name is required"));
    }
    Ok(name.to_string())
}

/// Renaming, moving or deleting a root goes beyond what a grant allows.
fn check_root_change(actor: &Actor, folder: &Folder) -> HubResult<()> {
    match folder.folder_type {
        FolderType::Personal => Err(HubError::invalid(
            "personal folders follow their owner's lifecycle",
        )),
        FolderType::Department => require_admin(actor),
        FolderType::Project => Ok(()),
    }
}

impl Hub {
    pub async fn create_subfolder(
        &self,
        actor: &Actor,
        parent_id: FolderId,
        name: &str,
    ) -> HubResult<Folder> {
        let name = clean_name(name)?;
        let folder = self
            .store
            .transaction(|t| {
                let me = current_actor(t, actor.user_id)?;
                let parent = t.require_folder(parent_id)?;
                resolve(t, &me, parent)?.require_write()?;
                let folder = Folder {
                    id: Uuid::new_v4(),
                    name: name.clone(),
                    folder_type: FolderType::Project,
                    parent_id: Some(parent_id),
                    created_by_id: me.user_id,
                    allowed_dept: None,
                    lifecycle: Lifecycle::Active,
                };
                t.insert_folder(folder.clone())?;
                Ok(folder)
            })
            .await?;
        tracing::info!(folder = %folder.id, parent = %parent_id, "folder created");
        self.committed(
            Some(actor.user_id),
            folder.id,
            AuditEvent::CreateFolder { name, parent_id },
            ChangeScope::Folder(parent_id),
        );
        Ok(folder)
    }

    pub async fn create_department(&self, actor: &Actor, name: &str) -> HubResult<Folder> {
        let name = clean_name(name)?;
        let folder = self
            .store
            .transaction(|t| {
                let me = current_actor(t, actor.user_id)?;
                require_admin(&me)?;
                let folder = Folder {
                    id: Uuid::new_v4(),
                    name: name.clone(),
                    folder_type: FolderType::Department,
                    parent_id: None,
                    created_by_id: me.user_id,
                    allowed_dept: Some(name.clone()),
                    lifecycle: Lifecycle::Active,
                };
                t.insert_folder(folder.clone())?;
                Ok(folder)
            })
            .await?;
        tracing::info!(folder = %folder.id, "department created");
        self.committed(
            Some(actor.user_id),
            folder.id,
            AuditEvent::CreateDepartment { name },
            ChangeScope::Tree,
        );
        Ok(folder)
    }

    pub async fn create_file(
        &self,
        actor: &Actor,
        folder_id: FolderId,
        title: &str,
    ) -> HubResult<File> {
        let title = clean_name(title)?;
        let file = self
            .store
            .transaction(|t| {
                let me = current_actor(t, actor.user_id)?;
                let folder = t.require_folder(folder_id)?;
                resolve(t, &me, folder)?.require_write()?;
                let file = File {
                    id: Uuid::new_v4(),
                    title: title.clone(),
                    folder_id,
                    created_by_id: me.user_id,
                    deleted_at: None,
                };
                t.insert_file(file.clone())?;
                Ok(file)
            })
            .await?;
        self.committed(
            Some(actor.user_id),
            file.id,
            AuditEvent::CreateFile { title, folder_id },
            ChangeScope::Folder(folder_id),
        );
        Ok(file)
    }

    pub async fn rename_item(
        &self,
        actor: &Actor,
        kind: ItemKind,
        id: Uuid,
        new_name: &str,
    ) -> HubResult<()> {
        let new_name = clean_name(new_name)?;
        let (old_name, parent) = self
            .store
            .transaction(|t| {
                let me = current_actor(t, actor.user_id)?;
                match kind {
                    ItemKind::Folder => {
                        let folder = t.require_folder(id)?;
                        let access = resolve(t, &me, folder)?;
                        check_root_change(&me, folder)?;
                        access.require_write()?;
                        let folder = t.folder_mut(id)?;
                        let old = std::mem::replace(&mut folder.name, new_name.clone());
                        Ok((old, folder.parent_id))
                    }
                    ItemKind::File => {
                        let file = t.require_file(id)?;
                        resolve_file(t, &me, file)?.require_write()?;
                        let file = t.file_mut(id)?;
                        let old = std::mem::replace(&mut file.title, new_name.clone());
                        Ok((old, Some(file.folder_id)))
                    }
                }
            })
            .await?;
        self.committed(
            Some(actor.user_id),
            id,
            AuditEvent::RenameItem {
                item_type: kind,
                old_name,
                new_name,
            },
            parent.map(ChangeScope::Folder).unwrap_or(ChangeScope::Tree),
        );
        Ok(())
    }

    /// Move a folder or file under `destination`. Moving a folder into
    /// itself or one of its descendants is rejected; the check runs in the
    /// same transaction as the write.
    pub async fn move_item(
        &self,
        actor: &Actor,
        kind: ItemKind,
        id: Uuid,
        destination: FolderId,
    ) -> HubResult<()> {
        let dest_name = self
            .store
            .transaction(|t| {
                let me = current_actor(t, actor.user_id)?;
                let dest = t.require_folder(destination)?;
                let dest_access = resolve(t, &me, dest)?;
                let dest_name = dest.name.clone();
                match kind {
                    ItemKind::Folder => {
                        let folder = t.require_folder(id)?;
                        let access = resolve(t, &me, folder)?;
                        if folder.folder_type.is_root() {
                            return Err(HubError::invalid("root folders cannot be moved"));
                        }
                        access.require_write()?;
                        dest_access.require_write()?;
                        if destination == id || t.is_within(destination, id) {
                            return Err(HubError::invalid(
                                "cannot move a folder into itself or one of its descendants",
                            ));
                        }
                        t.folder_mut(id)?.parent_id = Some(destination);
                    }
                    ItemKind::File => {
                        let file = t.require_file(id)?;
                        resolve_file(t, &me, file)?.require_write()?;
                        dest_access.require_write()?;
                        t.file_mut(id)?.folder_id = destination;
                    }
                }
                Ok(dest_name)
            })
            .await?;
        self.committed(
            Some(actor.user_id),
            id,
            AuditEvent::MoveItem {
                item_type: kind,
                destination: dest_name,
                destination_id: destination,
            },
            ChangeScope::Tree,
        );
        Ok(())
    }

    /// Mark a folder or file deleted. A soft-deleted folder keeps its
    /// `is_active` flag; only the administrator switch clears that.
    pub async fn soft_delete_item(&self, actor: &Actor, kind: ItemKind, id: Uuid) -> HubResult<()> {
        let (name, parent) = self
            .store
            .transaction(|t| {
                let me = current_actor(t, actor.user_id)?;
                let now = Utc::now();
                match kind {
                    ItemKind::Folder => {
                        let folder = t.require_folder(id)?;
                        let access = resolve(t, &me, folder)?;
                        check_root_change(&me, folder)?;
                        access.require_delete()?;
                        let folder = t.folder_mut(id)?;
                        folder.lifecycle = folder
                            .lifecycle
                            .soft_deleted(now)
                            .ok_or_else(|| HubError::invalid("item is already deleted"))?;
                        Ok((folder.name.clone(), folder.parent_id))
                    }
                    ItemKind::File => {
                        let file = t.require_file(id)?;
                        resolve_file(t, &me, file)?.require_delete()?;
                        let file = t.file_mut(id)?;
                        if file.deleted_at.is_some() {
                            return Err(HubError::invalid("item is already deleted"));
                        }
                        file.deleted_at = Some(now);
                        Ok((file.title.clone(), Some(file.folder_id)))
                    }
                }
            })
            .await?;
        tracing::info!(item = %id, kind = kind.as_str(), "item soft-deleted");
        self.committed(
            Some(actor.user_id),
            id,
            AuditEvent::SoftDeleteItem {
                item_type: kind,
                name,
            },
            parent.map(ChangeScope::Folder).unwrap_or(ChangeScope::Tree),
        );
        Ok(())
    }

    /// Administrator switch for a folder. Deactivating hides it and stamps
    /// the deletion time; reactivating clears both. Returns the new
    /// `is_active` value. PERSONAL folders only change with their owner.
    pub async fn toggle_folder_active(
        &self,
        actor: &Actor,
        folder_id: FolderId,
    ) -> HubResult<bool> {
        let folder = self
            .store
            .transaction(|t| {
                let me = current_actor(t, actor.user_id)?;
                require_admin(&me)?;
                if t.require_folder(folder_id)?.folder_type == FolderType::Personal {
                    return Err(HubError::invalid(
                        "personal folders follow their owner's lifecycle",
                    ));
                }
                let folder = t.folder_mut(folder_id)?;
                folder.lifecycle = folder.lifecycle.toggled(Utc::now());
                Ok(folder.clone())
            })
            .await?;
        let active = folder.is_active();
        let event = if active {
            AuditEvent::ActivateFolder {
                name: folder.name.clone(),
                folder_type: folder.folder_type,
            }
        } else {
            AuditEvent::DeactivateFolder {
                name: folder.name.clone(),
                folder_type: folder.folder_type,
            }
        };
        self.committed(Some(actor.user_id), folder.id, event, ChangeScope::Tree);
        Ok(active)
    }

    pub async fn folder(&self, actor: &Actor, id: FolderId) -> HubResult<Folder> {
        self.store
            .read(|t| {
                let me = current_actor(t, actor.user_id)?;
                let folder = t.require_folder(id)?;
                resolve(t, &me, folder)?.require_read()?;
                Ok(folder.clone())
            })
            .await
    }

    pub async fn file(&self, actor: &Actor, id: FileId) -> HubResult<File> {
        self.store
            .read(|t| {
                let me = current_actor(t, actor.user_id)?;
                let file = t.require_file(id)?;
                resolve_file(t, &me, file)?.require_read()?;
                Ok(file.clone())
            })
            .await
    }
}
