use super::{AdminCreds, json_error};
use crate::db::BoardRepo;
use axum::{
    Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

/// Shared state for tag handlers
#[derive(Clone)]
pub struct TagState {
    pub repo: Arc<BoardRepo>,
    pub admin: AdminCreds,
}

pub fn tag_routes(state: TagState) -> Router {
    Router::new()
        .route("/tags", get(list_tags).post(create_tag))
        .route("/tags/suggest", get(suggest_tags))
        .route("/tags/{id}", axum::routing::delete(delete_tag))
        .with_state(state)
}

/// GET /tags
async fn list_tags(State(state): State<TagState>) -> impl IntoResponse {
    match state.repo.list_tags() {
        Ok(tags) => Json(tags).into_response(),
        Err(err) => {
            error!("Failed to list tags: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateTagRequest {
    name: String,
}

/// POST /tags - idempotent by name
async fn create_tag(
    State(state): State<TagState>,
    Json(body): Json<CreateTagRequest>,
) -> impl IntoResponse {
    let name = body.name.trim();
    if name.is_empty() || name.len() > 50 {
        return json_error(
            StatusCode::BAD_REQUEST,
            "tag name must be between 1 and 50 characters",
        );
    }
    match state.repo.get_or_create_tag(name) {
        Ok(tag) => (StatusCode::CREATED, Json(tag)).into_response(),
        Err(err) => {
            error!("Failed to create tag: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SuggestParams {
    #[serde(default)]
    query: String,
}

/// GET /tags/suggest?query= - prefix autocomplete
async fn suggest_tags(
    State(state): State<TagState>,
    Query(params): Query<SuggestParams>,
) -> impl IntoResponse {
    match state.repo.suggest_tags(params.query.trim()) {
        Ok(tags) => Json(tags).into_response(),
        Err(err) => {
            error!("Failed to suggest tags: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// DELETE /tags/:id - admin only
async fn delete_tag(
    State(state): State<TagState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if !state.admin.authorize(&headers) {
        return AdminCreds::unauthorized();
    }
    match state.repo.delete_tag(id) {
        Ok(true) => {
            info!(id, "tag deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => json_error(StatusCode::NOT_FOUND, "tag not found"),
        Err(err) => {
            error!("Failed to delete tag {}: {}", id, err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
