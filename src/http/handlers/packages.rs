//! Package endpoints: publish, metadata and tarball download

use crate::http::auth::authenticate;
use crate::http::errors::HttpResult;
use crate::http::handlers::AppState;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

/// PUT /{package} - publish one or more versions
pub async fn publish_package(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> HttpResult<(StatusCode, Json<Value>)> {
    let user = authenticate(&state.users, &headers).await?;
    let outcome = state.storage.publish(&name, body, &user).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "ok": format!("created new package {}@{}", name, outcome.versions.join(",")),
            "success": true,
        })),
    ))
}

/// GET /{package} - package document
pub async fn get_package(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> HttpResult<Json<Value>> {
    Ok(Json(state.storage.read_document(&name).await?))
}

/// GET /{package}/-/{file}
pub async fn get_tarball(
    State(state): State<AppState>,
    Path((name, file)): Path<(String, String)>,
) -> HttpResult<impl IntoResponse> {
    tarball_response(&state, &name, &file).await
}

/// GET /@{scope}/{package}/-/{file}
pub async fn get_scoped_tarball(
    State(state): State<AppState>,
    Path((scope, name, file)): Path<(String, String, String)>,
) -> HttpResult<impl IntoResponse> {
    tarball_response(&state, &format!("{}/{}", scope, name), &file).await
}

async fn tarball_response(
    state: &AppState,
    name: &str,
    file: &str,
) -> HttpResult<impl IntoResponse> {
    let bytes = state.storage.read_tarball(name, file).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    ))
}
