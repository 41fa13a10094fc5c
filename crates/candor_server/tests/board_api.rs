use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use base64::Engine;
use candor_core::{RatePolicy, VisitorRegistry, VoteIdentity};
use candor_server::{
    config::Config,
    db::{BoardRepo, init_database},
    handlers::{AdminCreds, BoardState, TagState, confession_routes, tag_routes},
};
use rusqlite::Connection;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::util::ServiceExt;

fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_path: ":memory:".into(),
        cors_origins: Vec::new(),
        admin_username: "admin".to_string(),
        admin_password: "s3cret".to_string(),
        post_rate_per_hour: 10.0,
        post_burst: 3,
        vote_rate_secs: 10.0,
        vote_burst: 3,
        sweep_interval_secs: 300,
        visitor_retention_secs: 600,
    }
}

fn setup() -> (Router, Arc<BoardRepo>) {
    let conn = Connection::open_in_memory().expect("in-memory sqlite");
    init_database(&conn).expect("init db");
    let repo = Arc::new(BoardRepo::new(conn));
    let admin = AdminCreds::from_config(&test_config());

    let board_state = BoardState {
        repo: repo.clone(),
        // No refill within the test window; burst 3.
        post_visitors: Arc::new(VisitorRegistry::new(RatePolicy::per_hour(0.0, 3))),
        admin: admin.clone(),
    };
    let tag_state = TagState {
        repo: repo.clone(),
        admin,
    };
    let app = Router::new()
        .merge(confession_routes(board_state))
        .merge(tag_routes(tag_state));
    (app, repo)
}

fn admin_header() -> String {
    let token = base64::engine::general_purpose::STANDARD.encode("admin:s3cret");
    format!("Basic {token}")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, ip: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-forwarded-for", ip)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn create(app: &Router, ip: &str, title: &str, language: &str) -> (StatusCode, Value) {
    let body = json!({
        "title": title,
        "description": format!("{title}, and I would do it again."),
        "language": language,
        "tags": ["confession"],
    });
    send(app, post_json("/confessions", ip, &body)).await
}

#[tokio::test]
async fn create_and_fetch_confession() {
    let (app, _repo) = setup();

    let (status, created) = create(&app, "203.0.113.7", "I never read the docs", "rust").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["title"], "I never read the docs");
    assert_eq!(created["upvotes"], 0);
    assert_eq!(created["isFlagged"], false);
    assert_eq!(created["tags"], json!(["confession"]));
    assert!(created["createdAt"].is_string());

    let id = created["id"].as_i64().unwrap();
    let (status, fetched) = send(&app, get(&format!("/confessions/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], id);

    let (status, list) = send(&app, get("/confessions")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn create_accepts_flagged_submissions() {
    let (app, _repo) = setup();
    let body = json!({
        "title": "I flagged my own post",
        "description": "It deserved the scrutiny it got.",
        "language": "go",
        "isFlagged": true,
    });
    let (status, created) = send(&app, post_json("/confessions", "10.0.0.9", &body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["isFlagged"], true);
}

#[tokio::test]
async fn create_validates_input() {
    let (app, _repo) = setup();

    let short_title = json!({
        "title": "oops",
        "description": "long enough description",
        "language": "rust",
    });
    let (status, body) = send(&app, post_json("/confessions", "203.0.113.7", &short_title)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("title"));

    let short_description = json!({
        "title": "a proper title",
        "description": "short",
        "language": "rust",
    });
    let (status, _) = send(
        &app,
        post_json("/confessions", "203.0.113.7", &short_description),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let no_language = json!({
        "title": "a proper title",
        "description": "long enough description",
        "language": "  ",
    });
    let (status, _) = send(&app, post_json("/confessions", "203.0.113.7", &no_language)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn posting_is_rate_limited_per_origin() {
    let (app, _repo) = setup();

    for i in 0..3 {
        let (status, _) = create(&app, "203.0.113.7", &format!("confession number {i}"), "go").await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, body) = create(&app, "203.0.113.7", "one confession too many", "go").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "too many confessions, slow down");

    // A different origin still has its full burst.
    let (status, _) = create(&app, "198.51.100.23", "a fresh perspective", "go").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn list_pagination_and_language_filter() {
    let (app, _repo) = setup();
    create(&app, "10.0.0.1", "rust confession", "rust").await;
    create(&app, "10.0.0.2", "go confession one", "go").await;
    create(&app, "10.0.0.3", "go confession two", "Go").await;

    let (_, page) = send(&app, get("/confessions?limit=2")).await;
    assert_eq!(page.as_array().unwrap().len(), 2);

    let (_, rest) = send(&app, get("/confessions?offset=2&limit=2")).await;
    assert_eq!(rest.as_array().unwrap().len(), 1);

    // limit=0 clamps to 1 instead of an empty page.
    let (_, clamped) = send(&app, get("/confessions?limit=0")).await;
    assert_eq!(clamped.as_array().unwrap().len(), 1);

    let (_, by_language) = send(&app, get("/confessions/language/go")).await;
    assert_eq!(by_language.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn search_filters_combine() {
    let (app, _repo) = setup();
    create(&app, "10.0.0.1", "dropped the staging table", "sql").await;
    create(&app, "10.0.0.2", "unwrapped in production", "rust").await;

    let (_, by_text) = send(&app, get("/confessions/search?q=staging")).await;
    assert_eq!(by_text.as_array().unwrap().len(), 1);
    assert_eq!(by_text[0]["language"], "sql");

    let (_, by_both) = send(&app, get("/confessions/search?q=production&language=rust")).await;
    assert_eq!(by_both.as_array().unwrap().len(), 1);

    let (_, by_tag) = send(&app, get("/confessions/search?tag=confession")).await;
    assert_eq!(by_tag.as_array().unwrap().len(), 2);

    let (_, none) = send(&app, get("/confessions/search?q=staging&language=rust")).await;
    assert_eq!(none.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn leaderboards_follow_the_counter() {
    let (app, repo) = setup();
    create(&app, "10.0.0.1", "quiet confession", "go").await;
    let (_, b) = create(&app, "10.0.0.2", "popular confession", "go").await;
    let b_id = b["id"].as_i64().unwrap();

    repo.insert_vote(b_id, &VoteIdentity::new("h1", "")).unwrap();
    repo.increment_upvotes(b_id).unwrap();

    let (_, top) = send(&app, get("/confessions/top")).await;
    assert_eq!(top[0]["id"], b["id"]);
    assert_eq!(top.as_array().unwrap().len(), 2);

    // Hall of fame only lists entries that collected votes.
    let (_, fame) = send(&app, get("/confessions/hall-of-fame")).await;
    assert_eq!(fame.as_array().unwrap().len(), 1);
    assert_eq!(fame[0]["id"], b["id"]);

    // Both were created just now, so both trend.
    let (_, weekly) = send(&app, get("/confessions/trending/weekly")).await;
    assert_eq!(weekly.as_array().unwrap().len(), 2);
    assert_eq!(weekly[0]["id"], b["id"]);
}

#[tokio::test]
async fn random_returns_404_on_empty_board() {
    let (app, _repo) = setup();
    let (status, _) = send(&app, get("/confessions/random")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    create(&app, "10.0.0.1", "the only confession", "go").await;
    let (status, body) = send(&app, get("/confessions/random")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "the only confession");
}

#[tokio::test]
async fn delete_requires_admin_credentials() {
    let (app, _repo) = setup();
    let (_, created) = create(&app, "10.0.0.1", "soon to be removed", "go").await;
    let id = created["id"].as_i64().unwrap();

    let unauthorized = Request::builder()
        .method("DELETE")
        .uri(format!("/confessions/{id}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, unauthorized).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let authorized = Request::builder()
        .method("DELETE")
        .uri(format!("/confessions/{id}"))
        .header(header::AUTHORIZATION, admin_header())
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, authorized).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Gone now.
    let again = Request::builder()
        .method("DELETE")
        .uri(format!("/confessions/{id}"))
        .header(header::AUTHORIZATION, admin_header())
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, again).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tag_endpoints() {
    let (app, _repo) = setup();

    let (status, tag) = send(
        &app,
        post_json("/tags", "10.0.0.1", &json!({ "name": "git" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Creating the same tag again is idempotent by name.
    let (status, same) = send(
        &app,
        post_json("/tags", "10.0.0.1", &json!({ "name": "git" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(tag["id"], same["id"]);

    send(
        &app,
        post_json("/tags", "10.0.0.1", &json!({ "name": "github" })),
    )
    .await;

    let (_, all) = send(&app, get("/tags")).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, suggested) = send(&app, get("/tags/suggest?query=git")).await;
    assert_eq!(suggested.as_array().unwrap().len(), 2);

    let (status, _) = send(
        &app,
        post_json("/tags", "10.0.0.1", &json!({ "name": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let tag_id = tag["id"].as_i64().unwrap();
    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/tags/{tag_id}"))
        .header(header::AUTHORIZATION, admin_header())
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
