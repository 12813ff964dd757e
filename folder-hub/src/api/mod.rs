//! HTTP API layer exposing the hub operations.
//!
//! Every response body is an [`Envelope`]; the status code mirrors the
//! error kind so plain HTTP clients can branch without parsing.

mod extract;
mod stream;
mod users;

pub use extract::{ApiJson, ApiPath};

use axum::{
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use folder_hub_core::engine::{envelope, AuditEntry, FolderListing, ListTarget};
use folder_hub_core::error::{Envelope, HubError, HubResult};
use folder_hub_core::identity::{Hs256Verifier, TokenVerifier};
use folder_hub_core::model::{Actor, File, Folder, ItemKind};
use folder_hub_core::Hub;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Status code plus envelope body.
pub type Reply<T> = (StatusCode, Json<Envelope<T>>);

pub fn status_for(err: &HubError) -> StatusCode {
    match err {
        HubError::Unauthenticated => StatusCode::UNAUTHORIZED,
        HubError::AccessDenied(_) => StatusCode::FORBIDDEN,
        HubError::NotFound(_) => StatusCode::NOT_FOUND,
        HubError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
        HubError::StoreFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn reply<T>(operation: &str, res: HubResult<T>) -> Reply<T> {
    let status = match &res {
        Ok(_) => StatusCode::OK,
        Err(e) => status_for(e),
    };
    (status, Json(envelope(operation, res)))
}

/// Authenticated caller, resolved against the user table on every request.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub actor: Actor,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = Reply<()>;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        // a present but unusable Authorization header never falls through
        let user_id = match headers.get(AUTHORIZATION) {
            Some(value) => {
                let token = value.to_str().ok().and_then(|v| v.strip_prefix("Bearer "));
                match token {
                    Some(token) => state.verifier.verify(token).await.and_then(|c| c.user_id()),
                    None => None,
                }
            }
            None if state.config.trust_user_id_header => headers
                .get("X-User-Id")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| Uuid::parse_str(s).ok()),
            None => None,
        };
        let Some(user_id) = user_id else {
            return Err(reply("authenticate", Err(HubError::Unauthenticated)));
        };
        match state.hub.identify(user_id).await {
            Ok(actor) => Ok(Self { actor }),
            Err(e) => Err(reply("authenticate", Err(e))),
        }
    }
}

/// Lifetime of tokens handed out by `/auth/login`.
const SESSION_TTL_SECS: u64 = 12 * 3600;

/// Knobs for the HTTP layer.
#[derive(Clone, Debug, Default)]
pub struct ApiConfig {
    /// Accept a bare `X-User-Id` header as identity when no Authorization
    /// header is sent. Development and tests only.
    pub trust_user_id_header: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub tokens: Arc<Hs256Verifier>,
    pub config: ApiConfig,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    user: Actor,
}

#[derive(Deserialize)]
struct NameRequest {
    name: String,
}

#[derive(Deserialize)]
struct FileRequest {
    title: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveRequest {
    destination_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToggleResponse {
    is_active: bool,
}

pub fn router(hub: Arc<Hub>, tokens: Arc<Hs256Verifier>, config: ApiConfig) -> Router {
    let app_state = AppState {
        hub,
        verifier: tokens.clone(),
        tokens,
        config,
    };
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/auth/login", post(login))
        .route("/folders/mine", get(my_space))
        .route("/folders/personal-spaces", get(personal_spaces))
        .route("/folders/departments", get(all_departments))
        .route("/folders/{id}", get(list_folder))
        .route("/folders/{id}/children", post(create_subfolder))
        .route("/folders/{id}/files", post(create_file))
        .route("/folders/{id}/toggle-active", post(toggle_folder))
        .route(
            "/departments",
            get(users::list_departments).post(create_department),
        )
        .route("/items/{kind}/{id}", delete(soft_delete_item))
        .route("/items/{kind}/{id}/rename", put(rename_item))
        .route("/items/{kind}/{id}/move", put(move_item))
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            put(users::update_user).delete(users::soft_delete_user),
        )
        .route("/users/{id}/toggle-active", post(users::toggle_user))
        .route("/users/{id}/restore", post(users::restore_user))
        .route("/users/{id}/purge", delete(users::hard_delete_user))
        .route("/audit", get(audit_logs))
        .route("/events", get(stream::change_stream))
        .with_state(app_state)
}

async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Reply<LoginResponse> {
    let res = match state.hub.authenticate(&req.email, &req.password).await {
        Ok(user) => state
            .tokens
            .issue(user.user_id, SESSION_TTL_SECS)
            .map(|token| LoginResponse { token, user })
            .map_err(HubError::from),
        Err(e) => Err(e),
    };
    reply("login", res)
}

async fn my_space(State(state): State<AppState>, auth: AuthContext) -> Reply<FolderListing> {
    let res = state.hub.list_children(&auth.actor, ListTarget::MySpace).await;
    reply("listMySpace", res)
}

async fn personal_spaces(State(state): State<AppState>, auth: AuthContext) -> Reply<FolderListing> {
    let res = state
        .hub
        .list_children(&auth.actor, ListTarget::AllPersonal)
        .await;
    reply("listPersonalSpaces", res)
}

async fn all_departments(State(state): State<AppState>, auth: AuthContext) -> Reply<FolderListing> {
    let res = state
        .hub
        .list_children(&auth.actor, ListTarget::AllDepartments)
        .await;
    reply("listDepartmentRoots", res)
}

async fn list_folder(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<FolderListing> {
    let res = state
        .hub
        .list_children(&auth.actor, ListTarget::Folder(id))
        .await;
    reply("listChildren", res)
}

async fn create_subfolder(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<NameRequest>,
) -> Reply<Folder> {
    let res = state.hub.create_subfolder(&auth.actor, id, &req.name).await;
    reply("createSubfolder", res)
}

async fn create_file(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<FileRequest>,
) -> Reply<File> {
    let res = state.hub.create_file(&auth.actor, id, &req.title).await;
    reply("createFile", res)
}

async fn toggle_folder(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<ToggleResponse> {
    let res = state
        .hub
        .toggle_folder_active(&auth.actor, id)
        .await
        .map(|is_active| ToggleResponse { is_active });
    reply("toggleFolderActive", res)
}

async fn create_department(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<NameRequest>,
) -> Reply<Folder> {
    let res = state.hub.create_department(&auth.actor, &req.name).await;
    reply("createDepartment", res)
}

async fn rename_item(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath((kind, id)): ApiPath<(ItemKind, Uuid)>,
    ApiJson(req): ApiJson<NameRequest>,
) -> Reply<()> {
    let res = state.hub.rename_item(&auth.actor, kind, id, &req.name).await;
    reply("renameItem", res)
}

async fn move_item(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath((kind, id)): ApiPath<(ItemKind, Uuid)>,
    ApiJson(req): ApiJson<MoveRequest>,
) -> Reply<()> {
    let res = state
        .hub
        .move_item(&auth.actor, kind, id, req.destination_id)
        .await;
    reply("moveItem", res)
}

async fn soft_delete_item(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath((kind, id)): ApiPath<(ItemKind, Uuid)>,
) -> Reply<()> {
    let res = state.hub.soft_delete_item(&auth.actor, kind, id).await;
    reply("softDeleteItem", res)
}

async fn audit_logs(State(state): State<AppState>, auth: AuthContext) -> Reply<Vec<AuditEntry>> {
    let res = state.hub.audit_logs(&auth.actor).await;
    reply("getAuditLogs", res)
}
