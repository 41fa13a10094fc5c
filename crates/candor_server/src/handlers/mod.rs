//! HTTP route handlers and the shared request plumbing they use.

mod confessions;
mod tags;
mod votes;

pub use confessions::{BoardState, confession_routes};
pub use tags::{TagState, tag_routes};
pub use votes::{VoteState, vote_routes};

use crate::config::Config;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use base64::Engine;
use serde::Deserialize;

/// Offset/limit pagination, clamped server-side
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    /// Effective (offset, limit): offset >= 0, limit in 1..=100, default 10
    pub fn clamp(&self) -> (i64, i64) {
        let offset = self.offset.unwrap_or(0).max(0);
        let limit = self.limit.unwrap_or(10).clamp(1, 100);
        (offset, limit)
    }
}

/// JSON error body in the shape the frontend expects
pub fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Basic-auth credentials guarding admin endpoints.
///
/// Unset credentials disable the endpoints entirely rather than leaving
/// them open.
#[derive(Clone)]
pub struct AdminCreds {
    username: String,
    password: String,
    enabled: bool,
}

impl AdminCreds {
    pub fn from_config(config: &Config) -> Self {
        Self {
            username: config.admin_username.clone(),
            password: config.admin_password.clone(),
            enabled: config.is_admin_configured(),
        }
    }

    /// Check the Authorization header against the configured credentials
    pub fn authorize(&self, headers: &HeaderMap) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(value) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        else {
            return false;
        };
        let Some(encoded) = value.strip_prefix("Basic ") else {
            return false;
        };
        let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(encoded) else {
            return false;
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return false;
        };
        let Some((user, pass)) = decoded.split_once(':') else {
            return false;
        };
        user == self.username && pass == self.password
    }

    /// 401 response with the challenge header
    pub fn unauthorized() -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic realm=\"admin\"")],
            Json(serde_json::json!({ "error": "unauthorized" })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> AdminCreds {
        AdminCreds {
            username: "admin".to_string(),
            password: "s3cret".to_string(),
            enabled: true,
        }
    }

    fn auth_headers(user: &str, pass: &str) -> HeaderMap {
        let token = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"));
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Basic {token}").parse().unwrap(),
        );
        headers
    }

    #[test]
    fn pagination_defaults_and_clamps() {
        assert_eq!(Pagination::default().clamp(), (0, 10));
        let p = Pagination {
            offset: Some(-5),
            limit: Some(1000),
        };
        assert_eq!(p.clamp(), (0, 100));
        let p = Pagination {
            offset: Some(20),
            limit: Some(0),
        };
        assert_eq!(p.clamp(), (20, 1));
    }

    #[test]
    fn basic_auth_accepts_only_exact_credentials() {
        let creds = creds();
        assert!(creds.authorize(&auth_headers("admin", "s3cret")));
        assert!(!creds.authorize(&auth_headers("admin", "wrong")));
        assert!(!creds.authorize(&auth_headers("other", "s3cret")));
        assert!(!creds.authorize(&HeaderMap::new()));
    }

    #[test]
    fn unconfigured_admin_rejects_everything() {
        let creds = AdminCreds {
            username: String::new(),
            password: String::new(),
            enabled: false,
        };
        assert!(!creds.authorize(&auth_headers("", "")));
    }
}
