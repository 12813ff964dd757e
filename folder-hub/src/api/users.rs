use super::{reply, ApiJson, ApiPath, AppState, AuthContext, Reply};
use axum::extract::State;
use folder_hub_core::engine::{DepartmentRef, NewUser, UserDirectory, UserSummary, UserUpdate};
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ToggleUserResponse {
    is_active: bool,
}

pub(super) async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Reply<UserDirectory> {
    let res = state.hub.list_users(&auth.actor).await;
    reply("listUsers", res)
}

pub(super) async fn list_departments(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Reply<Vec<DepartmentRef>> {
    let res = state.hub.list_departments(&auth.actor).await;
    reply("listDepartments", res)
}

pub(super) async fn create_user(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<NewUser>,
) -> Reply<UserSummary> {
    let res = state.hub.create_user(&auth.actor, req).await;
    reply("createUser", res)
}

pub(super) async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UserUpdate>,
) -> Reply<UserSummary> {
    let res = state.hub.update_user(&auth.actor, id, req).await;
    reply("updateUser", res)
}

pub(super) async fn toggle_user(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<ToggleUserResponse> {
    let res = state
        .hub
        .toggle_user_active(&auth.actor, id)
        .await
        .map(|is_active| ToggleUserResponse { is_active });
    reply("toggleUserActive", res)
}

pub(super) async fn soft_delete_user(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<()> {
    let res = state.hub.soft_delete_user(&auth.actor, id).await;
    reply("softDeleteUser", res)
}

pub(super) async fn restore_user(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<()> {
    let res = state.hub.restore_user(&auth.actor, id).await;
    reply("restoreUser", res)
}

pub(super) async fn hard_delete_user(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<()> {
    let res = state.hub.hard_delete_user(&auth.actor, id).await;
    reply("hardDeleteUser", res)
}
