//! Extractors whose rejections keep the envelope shape.

use super::{reply, Reply};
use axum::{
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use folder_hub_core::error::HubError;
use serde::de::DeserializeOwned;

fn rejected(what: &str, detail: String) -> Reply<()> {
    tracing::debug!(%detail, "{} rejected", what);
    reply(what, Err(HubError::invalid(detail)))
}

/// JSON request body.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = Reply<()>;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(rejected("decodeBody", rejection.body_text())),
        }
    }
}

/// Typed path parameters, e.g. `{kind}` and `{id}`.
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = Reply<()>;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(rejected("decodePath", rejection.body_text())),
        }
    }
}
