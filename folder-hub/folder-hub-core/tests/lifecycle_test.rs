//! User and folder lifecycle, audit queries and store invariants.

mod common;

use anyhow::Result;
use common::{hub_with_admin, member};
use folder_hub_core::config::HubConfig;
use folder_hub_core::engine::{envelope, DepartmentGrant, ListTarget, UserUpdate};
use folder_hub_core::error::{Entity, HubError};
use folder_hub_core::model::{AccessType, FolderType, ItemKind, Lifecycle, Role, User};
use folder_hub_core::store::Tables;
use folder_hub_core::Hub;
use std::sync::Arc;
use uuid::Uuid;

fn assert_tree_invariants(t: &Tables) {
    for folder in t.folders() {
        match folder.folder_type {
            FolderType::Project => {
                assert!(folder.parent_id.is_some(), "{} has no parent", folder.name)
            }
            _ => assert!(
                folder.parent_id.is_none(),
                "{} is a root with a parent",
                folder.name
            ),
        }
        let chain = t.ancestry(folder.id);
        let top = chain.last().expect("ancestry includes the folder itself");
        assert!(top.folder_type.is_root(), "{} does not end at a root", folder.name);
        assert!(chain.len() <= t.folders().count());
    }
    for user in t.users().filter(|u| u.deleted_at().is_none()) {
        let personal: Vec<_> = t
            .folders()
            .filter(|f| f.folder_type == FolderType::Personal && f.created_by_id == user.id)
            .collect();
        assert_eq!(personal.len(), 1, "{} personal folders", user.full_name);
        assert_eq!(user.personal_folder_id, Some(personal[0].id));
    }
}

#[tokio::test]
async fn test_soft_delete_and_restore_user() -> Result<()> {
    let (hub, admin) = hub_with_admin().await?;
    let alice = member(&hub, &admin, "Alice", &[]).await?;
    let personal_id = hub.ensure_personal_folder(&alice).await?;
    let before = hub.folder(&admin, personal_id).await?;

    hub.soft_delete_user(&admin, alice.user_id).await?;

    let vault = hub.folder(&admin, personal_id).await?;
    assert!(vault.name.contains("VAULT"));
    assert!(vault.name.contains("Alice"));
    assert!(!vault.is_active());
    assert!(vault.deleted_at().is_some());
    let personal = hub.list_children(&admin, ListTarget::AllPersonal).await?;
    assert!(personal.subfolders.iter().all(|f| f.folder.id != personal_id));

    let (user_active, user_deleted) = hub
        .store()
        .read(|t| {
            let u = t.require_user(alice.user_id)?;
            Ok((u.is_active(), u.deleted_at().is_some()))
        })
        .await?;
    assert!(!user_active && user_deleted);
    assert_eq!(hub.identify(alice.user_id).await.unwrap_err(), HubError::Unauthenticated);

    hub.restore_user(&admin, alice.user_id).await?;

    let after = hub.folder(&admin, personal_id).await?;
    assert_eq!(after, before);
    hub.identify(alice.user_id).await?;
    assert!(matches!(
        hub.restore_user(&admin, alice.user_id).await,
        Err(HubError::InvalidOperation(_))
    ));
    hub.store()
        .read(|t| {
            assert_tree_invariants(t);
            Ok(())
        })
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_personal_folder_cannot_be_toggled_alone() -> Result<()> {
    let (hub, admin) = hub_with_admin().await?;
    let alice = member(&hub, &admin, "Alice", &[]).await?;
    let personal_id = hub.ensure_personal_folder(&alice).await?;
    let before = hub.folder(&admin, personal_id).await?;

    assert!(matches!(
        hub.toggle_folder_active(&admin, personal_id).await,
        Err(HubError::InvalidOperation(_))
    ));
    assert_eq!(hub.folder(&admin, personal_id).await?, before);

    hub.soft_delete_user(&admin, alice.user_id).await?;
    assert!(matches!(
        hub.toggle_folder_active(&admin, personal_id).await,
        Err(HubError::InvalidOperation(_))
    ));
    hub.restore_user(&admin, alice.user_id).await?;
    assert_eq!(hub.folder(&admin, personal_id).await?, before);
    Ok(())
}

#[tokio::test]
async fn test_user_without_personal_folder_still_soft_deletes() -> Result<()> {
    let (hub, admin) = hub_with_admin().await?;
    let id = Uuid::new_v4();
    hub.store()
        .transaction(|t| {
            t.insert_user(User {
                id,
                full_name: "Legacy".into(),
                email: "legacy@example.com".into(),
                password_hash: String::new(),
                role: Role::Member,
                lifecycle: Lifecycle::Active,
                personal_folder_id: None,
            })
        })
        .await?;

    hub.soft_delete_user(&admin, id).await?;
    hub.restore_user(&admin, id).await?;

    // restoring provisions the missing personal folder
    hub.store()
        .read(|t| {
            assert_tree_invariants(t);
            Ok(())
        })
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_admin_cannot_act_on_self() -> Result<()> {
    let (hub, admin) = hub_with_admin().await?;
    for res in [
        hub.toggle_user_active(&admin, admin.user_id).await.map(|_| ()),
        hub.soft_delete_user(&admin, admin.user_id).await,
        hub.hard_delete_user(&admin, admin.user_id).await,
    ] {
        assert!(matches!(res, Err(HubError::InvalidOperation(_))));
    }
    let demote = UserUpdate {
        role: Role::Member,
        departments: Vec::new(),
    };
    assert!(matches!(
        hub.update_user(&admin, admin.user_id, demote).await,
        Err(HubError::InvalidOperation(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_update_replaces_department_grants() -> Result<()> {
    let (hub, admin) = hub_with_admin().await?;
    let sales = hub.create_department(&admin, "Sales").await?;
    let legal = hub.create_department(&admin, "Legal").await?;
    let alice = member(&hub, &admin, "Alice", &[(&sales, AccessType::Write)]).await?;

    let updated = hub
        .update_user(
            &admin,
            alice.user_id,
            UserUpdate {
                role: Role::Member,
                departments: vec![DepartmentGrant {
                    folder_id: legal.id,
                    access: AccessType::Read,
                }],
            },
        )
        .await?;
    assert_eq!(updated.departments.len(), 1);
    assert_eq!(updated.departments[0].name, "Legal");
    assert_eq!(updated.departments[0].access_type, Some(AccessType::Read));

    assert!(hub.list_children(&alice, ListTarget::Folder(sales.id)).await.is_err());
    hub.list_children(&alice, ListTarget::Folder(legal.id)).await?;

    let directory = hub.list_users(&alice).await?;
    assert!(!directory.authorized);
    assert!(directory.users.is_empty());
    let directory = hub.list_users(&admin).await?;
    assert!(directory.authorized);
    let names: Vec<&str> = directory.users.iter().map(|u| u.full_name.as_str()).collect();
    assert_eq!(names, vec!["Alice", "Root Admin"]);
    Ok(())
}

#[tokio::test]
async fn test_hard_delete_cascades() -> Result<()> {
    let (hub, admin) = hub_with_admin().await?;
    let sales = hub.create_department(&admin, "Sales").await?;
    let alice = member(&hub, &admin, "Alice", &[(&sales, AccessType::Write)]).await?;
    let bob = member(&hub, &admin, "Bob", &[(&sales, AccessType::Write)]).await?;

    let project = hub.create_subfolder(&alice, sales.id, "Pipeline").await?;
    let bobs_note = hub.create_file(&bob, project.id, "bob's note").await?;
    let bobs_project = hub.create_subfolder(&bob, sales.id, "Leads").await?;
    let stray = hub.create_file(&alice, bobs_project.id, "alice's file").await?;
    let personal_id = hub.ensure_personal_folder(&alice).await?;

    assert!(matches!(
        hub.hard_delete_user(&admin, alice.user_id).await,
        Err(HubError::InvalidOperation(_))
    ));

    hub.soft_delete_user(&admin, alice.user_id).await?;
    hub.hard_delete_user(&admin, alice.user_id).await?;

    hub.store()
        .read(|t| {
            assert!(t.user(alice.user_id).is_none());
            assert!(t.folder(project.id).is_none());
            assert!(t.file(bobs_note.id).is_none());
            assert!(t.folder(personal_id).is_none());
            assert!(t.file(stray.id).is_none());
            assert!(t.grants_of(alice.user_id).is_empty());
            assert!(t.folder(bobs_project.id).is_some());
            assert!(t.folder(sales.id).is_some());
            assert_tree_invariants(t);
            Ok(())
        })
        .await?;

    hub.audit().flush().await;
    let logs = hub.audit_logs(&admin).await?;
    assert_eq!(logs[0].record.action, "HARD_DELETE_USER");
    assert_eq!(logs[0].record.details["foldersRemoved"], 2);
    let from_alice = logs
        .iter()
        .find(|e| e.record.user_id == Some(alice.user_id))
        .expect("alice's records are kept");
    assert!(from_alice.user.is_none());
    assert!(matches!(
        hub.hard_delete_user(&admin, alice.user_id).await,
        Err(HubError::NotFound(Entity::User))
    ));
    Ok(())
}

#[tokio::test]
async fn test_hard_delete_reassigns_departments() -> Result<()> {
    let (hub, admin) = hub_with_admin().await?;
    let second = hub
        .create_user(
            &admin,
            folder_hub_core::engine::NewUser {
                full_name: "Second Admin".into(),
                email: "second@example.com".into(),
                password: "another-secret".into(),
                role: Role::Superadmin,
                departments: Vec::new(),
            },
        )
        .await?;
    let second = hub.identify(second.id).await?;
    let hr = hub.create_department(&second, "HR").await?;

    hub.soft_delete_user(&admin, second.user_id).await?;
    hub.hard_delete_user(&admin, second.user_id).await?;

    let owner = hub.folder(&admin, hr.id).await?.created_by_id;
    assert_eq!(owner, admin.user_id);
    Ok(())
}

#[tokio::test]
async fn test_audit_logs_are_admin_only_and_bounded() -> Result<()> {
    let (hub, admin) = hub_with_admin().await?;
    let sales = hub.create_department(&admin, "Sales").await?;
    let alice = member(&hub, &admin, "Alice", &[(&sales, AccessType::Write)]).await?;
    for i in 0..210 {
        hub.create_subfolder(&admin, sales.id, &format!("batch {}", i)).await?;
    }
    hub.audit().flush().await;

    assert!(hub.audit_logs(&alice).await?.is_empty());

    let logs = hub.audit_logs(&admin).await?;
    assert_eq!(logs.len(), 200);
    assert!(logs
        .windows(2)
        .all(|w| w[0].record.timestamp >= w[1].record.timestamp));
    assert_eq!(logs[0].record.details["name"], "batch 209");
    Ok(())
}

#[tokio::test]
async fn test_full_audit_queue_never_fails_mutations() -> Result<()> {
    let config = HubConfig {
        audit_queue_capacity: 1,
        ..HubConfig::in_memory()
    };
    let hub = Hub::open(config).await?;
    let admin_id = hub
        .bootstrap_admin("Root Admin", "admin@example.com", "correct horse")
        .await?;
    let admin = hub.identify(admin_id).await?;
    let sales = hub.create_department(&admin, "Sales").await?;

    let mut created = Vec::new();
    for i in 0..50 {
        created.push(hub.create_subfolder(&admin, sales.id, &format!("burst {}", i)).await?);
    }
    hub.audit().flush().await;

    let listing = hub.list_children(&admin, ListTarget::Folder(sales.id)).await?;
    assert_eq!(listing.subfolders.len(), created.len());
    assert!(hub.audit_logs(&admin).await?.len() <= 52);
    Ok(())
}

#[tokio::test]
async fn test_move_rejects_cycles() -> Result<()> {
    let (hub, admin) = hub_with_admin().await?;
    let sales = hub.create_department(&admin, "Sales").await?;
    let a = hub.create_subfolder(&admin, sales.id, "a").await?;
    let b = hub.create_subfolder(&admin, a.id, "b").await?;
    let c = hub.create_subfolder(&admin, b.id, "c").await?;

    for dest in [a.id, b.id, c.id] {
        assert!(matches!(
            hub.move_item(&admin, ItemKind::Folder, a.id, dest).await,
            Err(HubError::InvalidOperation(_))
        ));
    }
    assert!(matches!(
        hub.move_item(&admin, ItemKind::Folder, sales.id, a.id).await,
        Err(HubError::InvalidOperation(_))
    ));

    hub.move_item(&admin, ItemKind::Folder, c.id, sales.id).await?;
    hub.move_item(&admin, ItemKind::Folder, a.id, c.id).await?;
    assert!(matches!(
        hub.move_item(&admin, ItemKind::Folder, c.id, b.id).await,
        Err(HubError::InvalidOperation(_))
    ));

    hub.store()
        .read(|t| {
            assert_tree_invariants(t);
            Ok(())
        })
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_soft_delete_item_keeps_active_flag() -> Result<()> {
    let (hub, admin) = hub_with_admin().await?;
    let sales = hub.create_department(&admin, "Sales").await?;
    let project = hub.create_subfolder(&admin, sales.id, "Pipeline").await?;
    let file = hub.create_file(&admin, project.id, "notes").await?;

    hub.soft_delete_item(&admin, ItemKind::File, file.id).await?;
    hub.soft_delete_item(&admin, ItemKind::Folder, project.id).await?;

    let folder = hub.folder(&admin, project.id).await?;
    assert!(folder.is_active());
    assert!(folder.deleted_at().is_some());
    assert!(hub.file(&admin, file.id).await?.deleted_at.is_some());

    let listing = hub.list_children(&admin, ListTarget::Folder(sales.id)).await?;
    assert!(listing.subfolders.is_empty());
    assert!(matches!(
        hub.soft_delete_item(&admin, ItemKind::Folder, project.id).await,
        Err(HubError::InvalidOperation(_))
    ));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_personal_folder_provisioning() -> Result<()> {
    let (hub, _admin) = hub_with_admin().await?;
    let hub = Arc::new(hub);
    let id = Uuid::new_v4();
    hub.store()
        .transaction(|t| {
            t.insert_user(User {
                id,
                full_name: "Newcomer".into(),
                email: "new@example.com".into(),
                password_hash: String::new(),
                role: Role::Member,
                lifecycle: Lifecycle::Active,
                personal_folder_id: None,
            })
        })
        .await?;
    let actor = hub.identify(id).await?;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let hub = Arc::clone(&hub);
        let actor = actor.clone();
        handles.push(tokio::spawn(async move {
            hub.list_children(&actor, ListTarget::MySpace).await
        }));
    }
    let mut seen = Vec::new();
    for handle in handles {
        let listing = handle.await??;
        seen.push(serde_json::to_value(&listing.current)?["id"].clone());
    }
    assert!(seen.windows(2).all(|w| w[0] == w[1]));

    let count = hub
        .store()
        .read(|t| {
            Ok(t.folders()
                .filter(|f| f.folder_type == FolderType::Personal && f.created_by_id == id)
                .count())
        })
        .await?;
    assert_eq!(count, 1);
    Ok(())
}

#[tokio::test]
async fn test_state_survives_restart() -> Result<()> {
    let tempdir = tempfile::tempdir()?;
    let config = HubConfig::persistent(tempdir.path());
    let (admin_id, dept_id) = {
        let hub = Hub::open(config.clone()).await?;
        let admin_id = hub
            .bootstrap_admin("Root Admin", "admin@example.com", "correct horse")
            .await?;
        let admin = hub.identify(admin_id).await?;
        let dept = hub.create_department(&admin, "Sales").await?;
        hub.audit().flush().await;
        (admin_id, dept.id)
    };

    let hub = Hub::open(config).await?;
    let again = hub
        .bootstrap_admin("Someone Else", "other@example.com", "whatever")
        .await?;
    assert_eq!(again, admin_id);
    let admin = hub.identify(admin_id).await?;
    let departments = hub.list_departments(&admin).await?;
    assert_eq!(departments.len(), 1);
    assert_eq!(departments[0].id, dept_id);

    let actions: Vec<String> = hub
        .audit_logs(&admin)
        .await?
        .into_iter()
        .map(|e| e.record.action)
        .collect();
    assert_eq!(actions, vec!["CREATE_DEPARTMENT", "BOOTSTRAP_ADMIN"]);
    Ok(())
}

#[tokio::test]
async fn test_envelope_hides_store_details() -> Result<()> {
    let failed = envelope::<()>("createFolder", Err(HubError::store("disk on fire")));
    assert!(!failed.success);
    assert_eq!(failed.error.as_deref(), Some("internal error"));

    let denied = envelope::<()>("createFolder", Err(HubError::NotFound(Entity::Folder)));
    assert_eq!(denied.error.as_deref(), Some("folder not found"));
    Ok(())
}
