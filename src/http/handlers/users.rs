//! User endpoints (`npm adduser` / `npm whoami`)

use crate::http::auth::authenticate;
use crate::http::errors::{HttpError, HttpResult};
use crate::http::handlers::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

const USER_PREFIX: &str = "org.couchdb.user:";

#[derive(Debug, Deserialize)]
pub struct AddUserRequest {
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AddUserResponse {
    pub ok: String,
    pub id: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct WhoamiResponse {
    pub username: String,
}

/// PUT /-/user/org.couchdb.user:{name} - create a user or log in
pub async fn add_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<AddUserRequest>,
) -> HttpResult<(StatusCode, Json<AddUserResponse>)> {
    let name = user_id
        .strip_prefix(USER_PREFIX)
        .ok_or_else(|| HttpError::NotFound(format!("unknown user document '{}'", user_id)))?;
    if name != request.name {
        return Err(HttpError::BadRequest(format!(
            "user document '{}' does not match name '{}'",
            name, request.name
        )));
    }

    let token = state.users.add_user(&request.name, &request.password).await?;
    tracing::debug!(
        "Issued token for {} (email: {})",
        request.name,
        request.email.as_deref().unwrap_or("-")
    );

    Ok((
        StatusCode::CREATED,
        Json(AddUserResponse {
            ok: format!("user '{}' created", request.name),
            id: user_id.clone(),
            token,
        }),
    ))
}

/// GET /-/whoami - user behind the bearer token
pub async fn whoami(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> HttpResult<Json<WhoamiResponse>> {
    let username = authenticate(&state.users, &headers).await?;
    Ok(Json(WhoamiResponse { username }))
}
