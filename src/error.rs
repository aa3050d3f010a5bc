use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Not permitted: {0}")]
    Authority(String),

    #[error("Already linked: {0}")]
    AlreadyLinked(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Remote failure: {0}")]
    RemoteFailure(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable error kind, sent as `code` in error bodies
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated => "unauthenticated",
            AppError::Authority(_) => "authority",
            AppError::AlreadyLinked(_) => "already_linked",
            AppError::InvalidState(_) => "invalid_state",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Conflict(_) => "conflict",
            AppError::HttpClient(_) | AppError::RemoteFailure(_) => "remote_failure",
            AppError::Database(_) | AppError::Internal(_) => "internal",
        }
    }

    /// Rebuilds a typed error from an error body returned by the API.
    ///
    /// Unknown codes become `RemoteFailure` so callers can still tell a
    /// transport or server fault apart from a rule violation.
    pub fn from_code(code: &str, message: String) -> Self {
        match code {
            "unauthenticated" => AppError::Unauthenticated,
            "authority" => AppError::Authority(message),
            "already_linked" => AppError::AlreadyLinked(message),
            "invalid_state" => AppError::InvalidState(message),
            "not_found" => AppError::NotFound(message),
            "invalid_input" => AppError::InvalidInput(message),
            "conflict" => AppError::Conflict(message),
            _ => AppError::RemoteFailure(message),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Authority(_) => StatusCode::FORBIDDEN,
            AppError::AlreadyLinked(_) | AppError::InvalidState(_) | AppError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::HttpClient(_) | AppError::RemoteFailure(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Authority(msg)
            | AppError::AlreadyLinked(msg)
            | AppError::InvalidState(msg)
            | AppError::NotFound(msg)
            | AppError::InvalidInput(msg)
            | AppError::Conflict(msg)
            | AppError::RemoteFailure(msg) => msg.clone(),
            AppError::Database(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, "Request failed with internal error");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

// Malformed request input is reported in the same body shape as rule errors

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

pub type AppResult<T> = Result<T, AppError>;
