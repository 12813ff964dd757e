#![allow(dead_code)]

use folder_hub_core::engine::{DepartmentGrant, NewUser};
use folder_hub_core::model::{AccessType, Actor, Folder, Role};
use folder_hub_core::Hub;

pub async fn hub_with_admin() -> anyhow::Result<(Hub, Actor)> {
    let hub = Hub::in_memory().await?;
    let id = hub
        .bootstrap_admin("Root Admin", "admin@example.com", "correct horse")
        .await?;
    let admin = hub.identify(id).await?;
    Ok((hub, admin))
}

pub async fn member(
    hub: &Hub,
    admin: &Actor,
    name: &str,
    grants: &[(&Folder, AccessType)],
) -> anyhow::Result<Actor> {
    let email = format!("{}@example.com", name.to_lowercase());
    let created = hub
        .create_user(
            admin,
            NewUser {
                full_name: name.to_string(),
                email,
                password: "secret-pass".to_string(),
                role: Role::Member,
                departments: grants
                    .iter()
                    .map(|(folder, access)| DepartmentGrant {
                        folder_id: folder.id,
                        access: *access,
                    })
                    .collect(),
            },
        )
        .await?;
    Ok(hub.identify(created.id).await?)
}
