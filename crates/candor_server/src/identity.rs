//! Request-level identity signals: client IP extraction and the long-lived
//! anonymous client cookie.

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use candor_core::digest;
use rand::RngCore;
use std::convert::Infallible;
use std::net::SocketAddr;

/// Name of the anonymous client-identity cookie
pub const CLIENT_COOKIE: &str = "candor_client_id";

/// Best-effort client IP, as a string. Empty when nothing is available.
///
/// Proxy headers win over the socket address so deployments behind a
/// reverse proxy see the real origin rather than the proxy's.
pub struct ClientIp(pub String);

fn ip_from_parts(parts: &Parts) -> String {
    if let Some(forwarded) = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        // First hop is the original client.
        if let Some(ip) = forwarded.split(',').next() {
            let ip = ip.trim();
            if !ip.is_empty() {
                return ip.to_string();
            }
        }
    }
    if let Some(real_ip) = parts.headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    String::new()
}

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(ip_from_parts(parts)))
    }
}

/// Rate-limiter table key for a caller: digest of the client token when
/// present, else digest of the origin address. Raw signals never become
/// registry keys.
pub fn rate_key(client_token: Option<&str>, ip: &str) -> String {
    digest(client_token.unwrap_or(ip))
}

/// The client-identity token carried in the cookie, if any
pub fn client_token(jar: &CookieJar) -> Option<String> {
    jar.get(CLIENT_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Issue a fresh client-identity cookie and return the token it carries.
///
/// `Secure` and `SameSite=None` only go out over HTTPS; browsers reject
/// SameSite=None cookies on plain HTTP, which would break local dev.
pub fn issue_client_token(jar: CookieJar, secure: bool) -> (CookieJar, String) {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);

    let mut cookie = Cookie::new(CLIENT_COOKIE, token.clone());
    cookie.set_path("/");
    cookie.set_max_age(time::Duration::days(365));
    cookie.set_http_only(true);
    if secure {
        cookie.set_secure(true);
        cookie.set_same_site(SameSite::None);
    } else {
        cookie.set_same_site(SameSite::Lax);
    }

    (jar.add(cookie), token)
}

/// True when the request reached us over HTTPS (directly or via proxy)
pub fn connection_is_secure(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map(|proto| proto.eq_ignore_ascii_case("https"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_for(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let parts = parts_for(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);
        assert_eq!(ip_from_parts(&parts), "203.0.113.7");
    }

    #[test]
    fn real_ip_is_the_fallback_header() {
        let parts = parts_for(&[("x-real-ip", "203.0.113.9")]);
        assert_eq!(ip_from_parts(&parts), "203.0.113.9");
    }

    #[test]
    fn no_signal_yields_empty() {
        let parts = parts_for(&[]);
        assert_eq!(ip_from_parts(&parts), "");
    }

    #[test]
    fn rate_keys_are_digests_not_raw_signals() {
        let by_ip = rate_key(None, "203.0.113.7");
        assert_eq!(by_ip.len(), 64);
        assert!(by_ip.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(by_ip, "203.0.113.7");
        assert_eq!(by_ip, digest("203.0.113.7"));

        // The client token wins over the address when present.
        let by_token = rate_key(Some("tok"), "203.0.113.7");
        assert_eq!(by_token, digest("tok"));
        assert_ne!(by_token, by_ip);
    }

    #[test]
    fn issued_token_round_trips_through_the_jar() {
        let (jar, token) = issue_client_token(CookieJar::new(), false);
        assert_eq!(token.len(), 32);
        assert_eq!(client_token(&jar), Some(token));
    }

    #[test]
    fn secure_detection_reads_forwarded_proto() {
        let mut headers = HeaderMap::new();
        assert!(!connection_is_secure(&headers));
        headers.insert("x-forwarded-proto", "https".parse().unwrap());
        assert!(connection_is_secure(&headers));
    }
}
