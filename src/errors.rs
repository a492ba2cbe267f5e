//! Error taxonomy shared by every flow and its HTTP mapping.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::users::repo::StoreError;

/// Client-fixable problems with the submitted input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field(s): {}", .0.join(", "))]
    MissingField(Vec<&'static str>),
    #[error("Provide {} for login", .0.join(" and "))]
    MissingCredential(Vec<&'static str>),
    #[error("Enter a valid email address.")]
    InvalidEmail,
    #[error("Field `{0}` is too long (max {1} characters)")]
    TooLong(&'static str, usize),
    #[error("Invalid value for `{0}`")]
    InvalidValue(&'static str),
    #[error("Malformed request body: {0}")]
    MalformedBody(String),
    #[error("Invalid query string: {0}")]
    InvalidQuery(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown email and wrong password collapse into this one variant.
    #[error("Invalid email or password.")]
    InvalidCredentials,
    #[error("Missing or malformed Authorization header")]
    MissingToken,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("You do not have permission to perform this action.")]
    Forbidden,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("A user with this email already exists.")]
    DuplicateEmail,
    #[error("User not found")]
    NotFound,
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error_message: String,
    pub status_code: u16,
}

impl ApiError {
    pub fn internal(e: impl Into<anyhow::Error>) -> Self {
        ApiError::Internal(e.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(AuthError::Forbidden) => StatusCode::FORBIDDEN,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::DuplicateEmail => StatusCode::CONFLICT,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => ApiError::DuplicateEmail,
            StoreError::NotFound => ApiError::NotFound,
            StoreError::Database(e) => ApiError::Internal(e.into()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ValidationError::MalformedBody(e.body_text()).into()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ValidationError::InvalidQuery(e.body_text()).into()
    }
}

// Every route has a single `:id` segment.
impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        ValidationError::InvalidValue("id").into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Internal(cause) = &self {
            error!(error = ?cause, "internal error");
        }
        let body = ErrorBody {
            error_message: self.to_string(),
            status_code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}
