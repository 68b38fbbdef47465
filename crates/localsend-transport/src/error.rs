//! HTTP status mapping for the protocol surface.
//!
//! `ApiError` sits at the transport boundary: handlers return
//! `Result<T, ApiError>`, and `IntoResponse` turns each variant into the
//! status code the protocol specifies (spec §4.4/§7), so no handler
//! constructs a `Response` by hand.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use localsend_core::LocalSendError;
use serde::de::DeserializeOwned;

/// Errors a handler can return, already categorized by HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed body or missing query parameters.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Offer was declined, token mismatch, or the session's peer could
    /// not be identified.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Another session already occupies the slot being requested.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Unexpected server-side failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };
        (status, message).into_response()
    }
}

/// `axum::Json` extractor whose rejection maps to `ApiError::BadRequest`
/// instead of axum's default 422, so malformed wire data (valid JSON,
/// wrong or missing fields, or not JSON at all) lands on the 400 the
/// protocol specifies (spec §4.4/§7) rather than a status the rest of
/// the surface never otherwise returns.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(ApiJson(value))
    }
}

impl From<LocalSendError> for ApiError {
    fn from(err: LocalSendError) -> Self {
        match err {
            LocalSendError::MalformedRequest(_) | LocalSendError::Serialization(_) => {
                ApiError::BadRequest(err.to_string())
            }
            LocalSendError::UnknownSession(_)
            | LocalSendError::UnknownFile { .. }
            | LocalSendError::TokenMismatch(_)
            | LocalSendError::Rejected => ApiError::Forbidden(err.to_string()),
            LocalSendError::Blocked => ApiError::Conflict(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
