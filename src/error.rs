// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Application error, mapped to a JSON error response.
///
/// "Nothing found" is not an error here: the presentation handlers turn empty
/// lookups into placeholder text. These variants cover storage failures,
/// malformed requests and access checks.
#[derive(Debug)]
pub enum AppError {
    /// Host database or in-process store failure. The detail is logged, never returned.
    InternalServerError(String),
    BadRequest(String),
    /// Missing or invalid viewer token on a protected route.
    AuthError(String),
    /// Valid token without the administrator role.
    Forbidden(String),
    NotFound(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InternalServerError(msg) => write!(f, "storage error: {msg}"),
            AppError::BadRequest(msg) => write!(f, "bad request: {msg}"),
            AppError::AuthError(msg) => write!(f, "unauthorized: {msg}"),
            AppError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            AppError::NotFound(msg) => write!(f, "not found: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!(error = %msg, "request failed on storage");
                "Internal Server Error".to_string()
            }
            AppError::BadRequest(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg) => msg,
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Lets `?` be used on queries against the host database.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_details_stay_out_of_responses() {
        let err = AppError::InternalServerError("Table 'wp_x' doesn't exist".into());
        assert_eq!(err.to_string(), "storage error: Table 'wp_x' doesn't exist");
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(AppError::Forbidden("no".into()).status(), StatusCode::FORBIDDEN);
    }
}
