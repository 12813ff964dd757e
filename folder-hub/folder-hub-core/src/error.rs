use serde::Serialize;
use thiserror::Error;

pub type HubResult<T> = Result<T, HubError>;

/// Why an authenticated actor was turned away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Denial {
    Generic,
    Department,
    AdminRequired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    Folder,
    File,
    User,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    #[error("not authorized")]
    Unauthenticated,
    #[error("{}", denial_message(.0))]
    AccessDenied(Denial),
    #[error("{}", not_found_message(.0))]
    NotFound(Entity),
    #[error("{0}")]
    InvalidOperation(String),
    #[error("store failure: {0}")]
    StoreFailure(String),
}

fn denial_message(denial: &Denial) -> &'static str {
    match denial {
        Denial::Generic => "access denied",
        Denial::Department => "access denied to this department",
        Denial::AdminRequired => "not authorized",
    }
}

fn not_found_message(entity: &Entity) -> &'static str {
    match entity {
        Entity::Folder => "folder not found",
        Entity::File => "file not found",
        Entity::User => "user not found",
    }
}

impl HubError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        HubError::InvalidOperation(msg.into())
    }

    pub fn store(msg: impl std::fmt::Display) -> Self {
        HubError::StoreFailure(msg.to_string())
    }

    /// Message safe to hand to a caller. Storage details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            HubError::StoreFailure(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<anyhow::Error> for HubError {
    fn from(e: anyhow::Error) -> Self {
        HubError::StoreFailure(format!("{:#}", e))
    }
}

impl From<std::io::Error> for HubError {
    fn from(e: std::io::Error) -> Self {
        HubError::StoreFailure(e.to_string())
    }
}

impl From<serde_json::Error> for HubError {
    fn from(e: serde_json::Error) -> Self {
        HubError::StoreFailure(e.to_string())
    }
}

/// Result shape handed across the operation boundary.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.success
    }
}

impl<T> From<HubResult<T>> for Envelope<T> {
    fn from(res: HubResult<T>) -> Self {
        match res {
            Ok(data) => Envelope::ok(data),
            Err(e) => Envelope::failed(e.public_message()),
        }
    }
}
