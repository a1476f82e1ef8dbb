//! Bearer token authentication for registry handlers

use crate::http::auth::users::UserStore;
use crate::http::errors::HttpError;
use axum::http::{header, HeaderMap};

/// Extract the bearer token from request headers
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").or_else(|| s.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Resolve the user behind the request's bearer token
pub async fn authenticate(users: &UserStore, headers: &HeaderMap) -> Result<String, HttpError> {
    let token = extract_token(headers)
        .ok_or_else(|| HttpError::Unauthorized("authorization required".to_string()))?;
    users
        .username_for(token)
        .await
        .ok_or_else(|| HttpError::Unauthorized("invalid or expired token".to_string()))
}
