//! Error handler for the token provider.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sqlx::Error as SQLxError;
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Message returned whenever the request body is unusable.
pub const INVALID_BODY: &str = "Please provide a valid userId and email address";

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Please provide a valid userId and email address")]
    Validation(#[from] ValidationErrors),

    #[error("Please provide a valid userId and email address")]
    Json(#[from] JsonRejection),

    #[error("{0}")]
    BadRequest(&'static str),

    #[error("unexpected error while generating token")]
    Sql(#[from] SQLxError),

    #[error("unexpected error while generating token")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("unexpected error while generating token")]
    ExpiryOverflow,

    #[error("request timed out")]
    Timeout,

    #[error("invalid configuration, {0}")]
    Configuration(&'static str),
}

impl ServerError {
    /// HTTP status matching this error kind.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Validation(_)
            | ServerError::Json(_)
            | ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseError {
    pub error: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            ServerError::Validation(err) => {
                tracing::debug!(error = %err, "request body rejected")
            },
            ServerError::Json(err) => {
                tracing::debug!(error = %err, "request body rejected")
            },
            ServerError::BadRequest(_) => (),
            ServerError::Sql(err) => {
                tracing::error!(error = %err, "refresh token store failed")
            },
            ServerError::Token(err) => {
                tracing::error!(error = %err, "token signing failed")
            },
            ServerError::ExpiryOverflow => {
                tracing::error!("refresh token expiry out of range")
            },
            ServerError::Timeout => tracing::warn!("request deadline exceeded"),
            ServerError::Configuration(details) => {
                tracing::error!(%details, "server misconfigured")
            },
        }

        (
            status,
            Json(ResponseError {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
