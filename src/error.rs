use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no aggregate matches the requested period")]
    NotFound,

    #[error("aggregate store unavailable: {0:#}")]
    StoreUnavailable(#[source] anyhow::Error),

    #[error("invalid employee payload: {0}")]
    InvalidEmployee(String),

    #[error("an employee with email '{0}' already exists")]
    DuplicateEmployee(String),

    #[error("admin role required")]
    Forbidden,

    #[error("employee store failure: {0:#}")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidEmployee(_) => StatusCode::BAD_REQUEST,
            ApiError::DuplicateEmployee(_) => StatusCode::CONFLICT,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::StoreUnavailable(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::NotFound => json!({ "error": "Data not found" }),
            ApiError::StoreUnavailable(_) => {
                tracing::error!(error = %self, "diversity query failed");
                json!({ "error": "Failed to fetch data" })
            }
            ApiError::InvalidEmployee(detail) => {
                tracing::info!(%detail, "rejected employee payload");
                json!({ "error": "Missing or invalid fields" })
            }
            ApiError::DuplicateEmployee(_) => json!({ "error": self.to_string() }),
            ApiError::Forbidden => json!({ "error": "Forbidden" }),
            ApiError::Internal(_) => {
                tracing::error!(error = %self, "employee request failed");
                json!({ "message": "Internal Server Error" })
            }
        };
        (status, Json(body)).into_response()
    }
}
