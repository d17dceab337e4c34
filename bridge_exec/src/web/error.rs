//! HTTP error responses. Every error is sent as `{"error": "<description>"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{goal_dispatcher::DispatchError, route_catalog::CatalogError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request was malformed or referred to an invalid route or waypoint
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Data is not yet available from upstream, or the upstream transport failed
    #[error("{0}")]
    Unavailable(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::UnknownRoute(_) | DispatchError::IndexOutOfRange { .. } => {
                ApiError::BadRequest(e.to_string())
            }
            DispatchError::PublishFailed(_) => ApiError::Unavailable(e.to_string()),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::EmptyName => ApiError::BadRequest(e.to_string()),
            CatalogError::NotFound(_) => ApiError::NotFound(e.to_string()),
        }
    }
}
