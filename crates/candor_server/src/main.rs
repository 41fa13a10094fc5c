use axum::{
    Router,
    http::{Method, header},
    routing::get,
};
use candor_core::{UpvoteGuard, VisitorRegistry};
use candor_server::{
    config::Config,
    db::{BoardRepo, init_database},
    handlers::{
        AdminCreds, BoardState, TagState, VoteState, confession_routes, tag_routes, vote_routes,
    },
    sweeper::Sweeper,
};
use rusqlite::Connection;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "candor_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting Candor board server v{}", env!("CARGO_PKG_VERSION"));
    info!("Database path: {:?}", config.database_path);
    info!("CORS origins: {:?}", config.cors_origins);
    if !config.is_admin_configured() {
        warn!("ADMIN_USERNAME/ADMIN_PASSWORD not set; admin endpoints are disabled");
    }

    // Initialize database
    let conn = match Connection::open(&config.database_path) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_database(&conn) {
        error!("Failed to initialize database: {}", e);
        std::process::exit(1);
    }

    // Create shared state
    let repo = Arc::new(BoardRepo::new(conn));
    let guard = Arc::new(UpvoteGuard::new(repo.clone()));
    let post_visitors = Arc::new(VisitorRegistry::new(config.post_policy()));
    let vote_visitors = Arc::new(VisitorRegistry::new(config.vote_policy()));
    let admin = AdminCreds::from_config(&config);

    // Start the visitor-table sweeper
    let sweeper = Sweeper::new(config.sweep_interval(), config.visitor_retention())
        .watch(post_visitors.clone())
        .watch(vote_visitors.clone())
        .spawn();

    let board_state = BoardState {
        repo: repo.clone(),
        post_visitors,
        admin: admin.clone(),
    };
    let tag_state = TagState {
        repo: repo.clone(),
        admin,
    };
    let vote_state = VoteState {
        repo,
        guard,
        vote_visitors,
    };

    // Build CORS layer
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .allow_origin(AllowOrigin::list(origins));

    // Build the router
    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(confession_routes(board_state))
        .merge(tag_routes(tag_state))
        .merge(vote_routes(vote_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Create listener
    let addr = config.server_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Server listening on http://{}", addr);

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .unwrap();

    sweeper.shutdown().await;
    info!("Server shut down gracefully");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
