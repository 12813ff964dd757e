//! Folder and file rows: tree invariants, lookups and subtree walks.

use super::Tables;
use crate::error::{Entity, HubError, HubResult};
use crate::model::{File, FileId, Folder, FolderId, FolderType, UserId};

impl Tables {
    pub fn folder(&self, id: FolderId) -> Option<&Folder> {
        self.folders.get(&id)
    }

    pub fn require_folder(&self, id: FolderId) -> HubResult<&Folder> {
        self.folders.get(&id).ok_or(HubError::NotFound(Entity::Folder))
    }

    pub fn folder_mut(&mut self, id: FolderId) -> HubResult<&mut Folder> {
        self.folders
            .get_mut(&id)
            .ok_or(HubError::NotFound(Entity::Folder))
    }

    pub fn folders(&self) -> impl Iterator<Item = &Folder> {
        self.folders.values()
    }

    /// Insert a folder after checking the root/parent invariants and the
    /// one-personal-folder-per-user guard.
    pub fn insert_folder(&mut self, folder: Folder) -> HubResult<()> {
        match (folder.folder_type, folder.parent_id) {
            (FolderType::Personal | FolderType::Department, Some(_)) => {
                return Err(HubError::invalid(format!(
                    "{} folders must be roots",
                    folder.folder_type.as_str()
                )));
            }
            (FolderType::Project, None) => {
                return Err(HubError::invalid("project folders need a parent"));
            }
            (FolderType::Project, Some(parent)) => {
                self.require_folder(parent)?;
            }
            _ => {}
        }
        if folder.folder_type == FolderType::Personal
            && self.personal_folder_of(folder.created_by_id).is_some()
        {
            return Err(HubError::invalid("user already has a personal folder"));
        }
        if self.folders.contains_key(&folder.id) {
            return Err(HubError::invalid("duplicate folder id"));
        }
        self.folders.insert(folder.id, folder);
        Ok(())
    }

    pub fn personal_folder_of(&self, user: UserId) -> Option<&Folder> {
        self.folders
            .values()
            .find(|f| f.folder_type == FolderType::Personal && f.created_by_id == user)
    }

    /// The folder and its ancestors, nearest first.
    pub fn ancestry(&self, id: FolderId) -> Vec<&Folder> {
        let mut out = Vec::new();
        let mut current = self.folders.get(&id);
        while let Some(folder) = current {
            // a corrupted tree must not loop forever
            if out.len() > self.folders.len() {
                break;
            }
            out.push(folder);
            current = folder.parent_id.and_then(|pid| self.folders.get(&pid));
        }
        out
    }

    pub fn root_of(&self, id: FolderId) -> Option<&Folder> {
        self.ancestry(id).last().copied()
    }

    pub fn nearest_department(&self, id: FolderId) -> Option<&Folder> {
        self.ancestry(id)
            .into_iter()
            .find(|f| f.folder_type == FolderType::Department)
    }

    /// True when `candidate` is `of` or lies somewhere below it.
    pub fn is_within(&self, candidate: FolderId, of: FolderId) -> bool {
        self.ancestry(candidate).iter().any(|f| f.id == of)
    }

    pub fn child_folders(&self, parent: FolderId) -> Vec<&Folder> {
        self.folders
            .values()
            .filter(|f| f.parent_id == Some(parent))
            .collect()
    }

    /// Ids of `id` and every folder below it.
    pub fn subtree_ids(&self, id: FolderId) -> Vec<FolderId> {
        let mut out = vec![id];
        let mut i = 0;
        while i < out.len() {
            let current = out[i];
            for child in self.child_folders(current) {
                if !out.contains(&child.id) {
                    out.push(child.id);
                }
            }
            i += 1;
        }
        out
    }

    pub fn file(&self, id: FileId) -> Option<&File> {
        self.files.get(&id)
    }

    pub fn require_file(&self, id: FileId) -> HubResult<&File> {
        self.files.get(&id).ok_or(HubError::NotFound(Entity::File))
    }

    pub fn file_mut(&mut self, id: FileId) -> HubResult<&mut File> {
        self.files.get_mut(&id).ok_or(HubError::NotFound(Entity::File))
    }

    pub fn insert_file(&mut self, file: File) -> HubResult<()> {
        self.require_folder(file.folder_id)?;
        self.files.insert(file.id, file);
        Ok(())
    }

    pub fn files_in(&self, folder: FolderId) -> Vec<&File> {
        self.files
            .values()
            .filter(|f| f.folder_id == folder)
            .collect()
    }

    pub fn files_created_by(&self, user: UserId) -> Vec<FileId> {
        self.files
            .values()
            .filter(|f| f.created_by_id == user)
            .map(|f| f.id)
            .collect()
    }

    pub fn remove_file(&mut self, id: FileId) -> Option<File> {
        self.files.remove(&id)
    }

    /// Remove a folder with everything below it, including files and the
    /// grants that point into the subtree. Returns the number of folders
    /// and files removed.
    pub fn remove_subtree(&mut self, id: FolderId) -> (usize, usize) {
        if !self.folders.contains_key(&id) {
            return (0, 0);
        }
        let ids = self.subtree_ids(id);
        let before = self.files.len();
        self.files.retain(|_, f| !ids.contains(&f.folder_id));
        let files_removed = before - self.files.len();
        self.grants.retain(|_, g| !ids.contains(&g.folder_id));
        for fid in &ids {
            self.folders.remove(fid);
        }
        (ids.len(), files_removed)
    }
}
