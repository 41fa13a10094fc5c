use super::json_error;
use crate::db::BoardRepo;
use crate::identity::{ClientIp, client_token, connection_is_secure, issue_client_token, rate_key};
use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::post,
};
use axum_extra::extract::CookieJar;
use candor_core::{UpvoteGuard, VisitorRegistry, VoteError, VoteIdentity, VoteOutcome};
use std::sync::Arc;
use tracing::{debug, error};

/// Shared state for the vote handler
#[derive(Clone)]
pub struct VoteState {
    pub repo: Arc<BoardRepo>,
    pub guard: Arc<UpvoteGuard<Arc<BoardRepo>>>,
    pub vote_visitors: Arc<VisitorRegistry>,
}

pub fn vote_routes(state: VoteState) -> Router {
    Router::new()
        .route("/confessions/{id}/upvote", post(upvote))
        .with_state(state)
}

/// POST /confessions/:id/upvote
///
/// Throttle first, then resolve the target, then hand the identity to the
/// guard. The cookie is issued on first contact so the stronger client
/// signal is available from the voter's very first vote onward.
async fn upvote(
    State(state): State<VoteState>,
    Path(id): Path<i64>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    jar: CookieJar,
) -> impl IntoResponse {
    // The limiter key prefers the client token: it survives address
    // changes and is not shared behind NAT. Both signals are digested;
    // raw tokens and addresses never double as table keys.
    let existing_token = client_token(&jar);
    let limiter_key = rate_key(existing_token.as_deref(), &ip);

    if !state.vote_visitors.allow(&limiter_key) {
        debug!(id, "vote throttled");
        return (
            jar,
            json_error(StatusCode::TOO_MANY_REQUESTS, "too many upvotes, slow down"),
        )
            .into_response();
    }

    match state.repo.get_confession(id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (jar, json_error(StatusCode::NOT_FOUND, "confession not found"))
                .into_response();
        }
        Err(err) => {
            error!("Failed to fetch confession {}: {}", id, err);
            return (jar, StatusCode::INTERNAL_SERVER_ERROR.into_response()).into_response();
        }
    }

    let (jar, token) = match existing_token {
        Some(token) => (jar, token),
        None => issue_client_token(jar, connection_is_secure(&headers)),
    };

    let identity = VoteIdentity::from_signals(Some(&ip), Some(&token));

    match state.guard.record(id, &identity) {
        Ok(VoteOutcome::Recorded) => (
            jar,
            Json(serde_json::json!({ "message": "upvote recorded" })),
        )
            .into_response(),
        Ok(VoteOutcome::AlreadyVoted) => (
            jar,
            Json(serde_json::json!({ "message": "already upvoted" })),
        )
            .into_response(),
        // Unreachable here (the cookie token is always present by now),
        // but the guard's contract includes it.
        Err(VoteError::MissingIdentity) => (
            jar,
            json_error(StatusCode::BAD_REQUEST, "no voter identity"),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to record vote on {}: {}", id, err);
            (
                jar,
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to upvote"),
            )
                .into_response()
        }
    }
}
