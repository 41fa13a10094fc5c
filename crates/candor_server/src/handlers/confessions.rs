use super::{AdminCreds, Pagination, json_error};
use crate::db::{BoardRepo, NewConfession};
use crate::identity::{ClientIp, rate_key};
use axum::{
    Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
};
use candor_core::VisitorRegistry;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

/// Shared state for confession handlers
#[derive(Clone)]
pub struct BoardState {
    pub repo: Arc<BoardRepo>,
    pub post_visitors: Arc<VisitorRegistry>,
    pub admin: AdminCreds,
}

pub fn confession_routes(state: BoardState) -> Router {
    Router::new()
        .route(
            "/confessions",
            get(list_confessions).post(create_confession),
        )
        .route("/confessions/top", get(top_confessions))
        .route("/confessions/hall-of-fame", get(hall_of_fame))
        .route("/confessions/trending/weekly", get(trending_weekly))
        .route("/confessions/trending/monthly", get(trending_monthly))
        .route("/confessions/random", get(random_confession))
        .route("/confessions/search", get(search_confessions))
        .route("/confessions/language/{language}", get(list_by_language))
        .route(
            "/confessions/{id}",
            get(get_confession).delete(delete_confession),
        )
        .with_state(state)
}

/// GET /confessions - newest first, paginated
async fn list_confessions(
    State(state): State<BoardState>,
    Query(page): Query<Pagination>,
) -> impl IntoResponse {
    let (offset, limit) = page.clamp();
    match state.repo.list_confessions(offset, limit) {
        Ok(confessions) => Json(confessions).into_response(),
        Err(err) => {
            error!("Failed to list confessions: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /confessions/:id
async fn get_confession(
    State(state): State<BoardState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.repo.get_confession(id) {
        Ok(Some(confession)) => Json(confession).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "confession not found"),
        Err(err) => {
            error!("Failed to fetch confession {}: {}", id, err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateConfessionRequest {
    title: String,
    description: String,
    language: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    tags: Vec<String>,
    /// Submitters can pre-flag their own post for moderator attention.
    #[serde(default)]
    is_flagged: bool,
}

/// POST /confessions - rate limited per origin
async fn create_confession(
    State(state): State<BoardState>,
    ClientIp(ip): ClientIp,
    Json(body): Json<CreateConfessionRequest>,
) -> impl IntoResponse {
    if !state.post_visitors.allow(&rate_key(None, &ip)) {
        return json_error(
            StatusCode::TOO_MANY_REQUESTS,
            "too many confessions, slow down",
        );
    }

    let title = body.title.trim();
    if title.len() < 5 || title.len() > 100 {
        return json_error(
            StatusCode::BAD_REQUEST,
            "title must be between 5 and 100 characters",
        );
    }
    if body.description.trim().len() < 10 {
        return json_error(
            StatusCode::BAD_REQUEST,
            "description must be at least 10 characters",
        );
    }
    if body.language.trim().is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "language is required");
    }

    let new = NewConfession {
        title: title.to_string(),
        description: body.description.trim().to_string(),
        language: body.language.trim().to_string(),
        snippet: body.snippet,
        tags: body.tags,
        is_flagged: body.is_flagged,
    };
    match state.repo.create_confession(&new) {
        Ok(confession) => {
            info!(id = confession.id, "confession created");
            (StatusCode::CREATED, Json(confession)).into_response()
        }
        Err(err) => {
            error!("Failed to create confession: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// DELETE /confessions/:id - admin only
async fn delete_confession(
    State(state): State<BoardState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if !state.admin.authorize(&headers) {
        return AdminCreds::unauthorized();
    }
    match state.repo.delete_confession(id) {
        Ok(true) => {
            info!(id, "confession deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => json_error(StatusCode::NOT_FOUND, "confession not found"),
        Err(err) => {
            error!("Failed to delete confession {}: {}", id, err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /confessions/language/:language
async fn list_by_language(
    State(state): State<BoardState>,
    Path(language): Path<String>,
    Query(page): Query<Pagination>,
) -> impl IntoResponse {
    let (offset, limit) = page.clamp();
    match state.repo.list_by_language(&language, offset, limit) {
        Ok(confessions) => Json(confessions).into_response(),
        Err(err) => {
            error!("Failed to list by language: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /confessions/top - all-time by vote counter
async fn top_confessions(
    State(state): State<BoardState>,
    Query(page): Query<Pagination>,
) -> impl IntoResponse {
    let (offset, limit) = page.clamp();
    match state.repo.top_confessions(offset, limit) {
        Ok(confessions) => Json(confessions).into_response(),
        Err(err) => {
            error!("Failed to list top confessions: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /confessions/hall-of-fame - all-time leaderboard, voted entries only
async fn hall_of_fame(
    State(state): State<BoardState>,
    Query(page): Query<Pagination>,
) -> impl IntoResponse {
    let (offset, limit) = page.clamp();
    match state.repo.hall_of_fame(offset, limit) {
        Ok(confessions) => Json(confessions).into_response(),
        Err(err) => {
            error!("Failed to list hall of fame: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn trending_since(state: &BoardState, days: i64, page: Pagination) -> axum::response::Response {
    let (offset, limit) = page.clamp();
    let since = Utc::now() - Duration::days(days);
    match state.repo.top_confessions_since(since, offset, limit) {
        Ok(confessions) => Json(confessions).into_response(),
        Err(err) => {
            error!("Failed to list trending confessions: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /confessions/trending/weekly
async fn trending_weekly(
    State(state): State<BoardState>,
    Query(page): Query<Pagination>,
) -> impl IntoResponse {
    trending_since(&state, 7, page).await
}

/// GET /confessions/trending/monthly
async fn trending_monthly(
    State(state): State<BoardState>,
    Query(page): Query<Pagination>,
) -> impl IntoResponse {
    trending_since(&state, 30, page).await
}

/// GET /confessions/random
async fn random_confession(State(state): State<BoardState>) -> impl IntoResponse {
    match state.repo.random_confession() {
        Ok(Some(confession)) => Json(confession).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "no confessions yet"),
        Err(err) => {
            error!("Failed to pick random confession: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    #[serde(default)]
    language: String,
    #[serde(default)]
    tag: String,
}

/// GET /confessions/search?q=&language=&tag=
async fn search_confessions(
    State(state): State<BoardState>,
    Query(params): Query<SearchParams>,
    Query(page): Query<Pagination>,
) -> impl IntoResponse {
    let (offset, limit) = page.clamp();
    match state
        .repo
        .search_confessions(&params.q, &params.language, &params.tag, offset, limit)
    {
        Ok(confessions) => Json(confessions).into_response(),
        Err(err) => {
            error!("Failed to search confessions: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
