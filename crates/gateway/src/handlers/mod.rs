use axum::http::{header::AUTHORIZATION, HeaderMap};
use boxkeeper_inventory::{session::bearer_token, Error};

use crate::error::ApiError;

pub mod auth;
pub mod boxes;

/// Bearer token from the `Authorization` header.
pub(crate) fn session_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| Error::Unauthorized.into())
}
