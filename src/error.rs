use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use log::error;
use serde_json::json;
use thiserror::Error;

/// Malformed or missing required input detected below the HTTP layer.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Failure returned by a handler; the message is what the caller sees.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Internal(&'static str),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Map a data-layer error: validation failures keep their message, anything else
    /// is logged with its cause chain and reduced to `generic`.
    pub fn from_store(err: anyhow::Error, generic: &'static str) -> Self {
        if let Some(v) = err.downcast_ref::<ValidationError>() {
            return Self::Validation(v.0.clone());
        }
        error!("{generic}: {err:#}");
        Self::Internal(generic)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
