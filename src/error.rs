use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::{error, warn};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not authenticated, visit /login first")]
    NotAuthenticated,
    #[error("unknown or expired login state")]
    InvalidState,
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),
    #[error("token exchange failed: {status} - {body}")]
    TokenExchangeFailed { status: u16, body: String },
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
    #[error("no track found for {0:?}")]
    TrackNotFound(String),
    #[error("upstream request failed: {status} - {body}")]
    UpstreamRequestFailed { status: u16, body: String },
    #[error("{0}")]
    ValidationFailed(String),
    #[error("network error: {0}")]
    Network(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotAuthenticated => "not_authenticated",
            AppError::InvalidState => "invalid_state",
            AppError::AuthorizationDenied(_) => "authorization_denied",
            AppError::TokenExchangeFailed { .. } => "token_exchange_failed",
            AppError::RefreshFailed(_) => "refresh_failed",
            AppError::TrackNotFound(_) => "track_not_found",
            AppError::UpstreamRequestFailed { .. } => "upstream_request_failed",
            AppError::ValidationFailed(_) => "validation_failed",
            AppError::Network(_) => "network_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            AppError::InvalidState
            | AppError::AuthorizationDenied(_)
            | AppError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            AppError::TrackNotFound(_) => StatusCode::NOT_FOUND,
            AppError::TokenExchangeFailed { .. }
            | AppError::RefreshFailed(_)
            | AppError::UpstreamRequestFailed { .. }
            | AppError::Network(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn upstream(&self) -> Option<(u16, &str)> {
        match self {
            AppError::TokenExchangeFailed { status, body }
            | AppError::UpstreamRequestFailed { status, body } => Some((*status, body.as_str())),
            _ => None,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationFailed(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::ValidationFailed(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.kind(), "{}", self);
        } else {
            warn!(kind = self.kind(), "{}", self);
        }

        let mut body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        if let Some((upstream_status, payload)) = self.upstream() {
            body["upstream_status"] = json!(upstream_status);
            // Keep the upstream payload structured when it is JSON.
            body["upstream"] = serde_json::from_str::<Value>(payload)
                .unwrap_or_else(|_| Value::String(payload.to_string()));
        }

        (status, Json(body)).into_response()
    }
}
