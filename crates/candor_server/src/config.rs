use candor_core::RatePolicy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host (default: 0.0.0.0)
    pub host: String,
    /// Server port (default: 8080)
    pub port: u16,
    /// Database file path (default: ./candor.db)
    pub database_path: PathBuf,
    /// CORS allowed origins (comma-separated)
    pub cors_origins: Vec<String>,
    /// Basic-auth credentials for admin endpoints (empty = disabled)
    pub admin_username: String,
    pub admin_password: String,
    /// Content-creation limiter: average posts per hour (default: 10)
    pub post_rate_per_hour: f64,
    /// Content-creation limiter: burst capacity (default: 3)
    pub post_burst: u32,
    /// Vote limiter: average seconds between votes (default: 10)
    pub vote_rate_secs: f64,
    /// Vote limiter: burst capacity (default: 3)
    pub vote_burst: u32,
    /// Seconds between visitor-table sweep passes (default: 300)
    pub sweep_interval_secs: u64,
    /// Seconds of inactivity before a visitor entry is evicted (default: 600)
    pub visitor_retention_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_path =
            PathBuf::from(env::var("DATABASE_PATH").unwrap_or_else(|_| "./candor.db".to_string()));

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173,http://localhost:5174".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let admin_username = env::var("ADMIN_USERNAME").unwrap_or_default();
        let admin_password = env::var("ADMIN_PASSWORD").unwrap_or_default();

        let post_rate_per_hour = env::var("POST_RATE_PER_HOUR")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10.0);
        let post_burst = env::var("POST_BURST")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .unwrap_or(3);

        let vote_rate_secs = env::var("VOTE_RATE_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10.0);
        let vote_burst = env::var("VOTE_BURST")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .unwrap_or(3);

        let sweep_interval_secs = env::var("SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .unwrap_or(300);
        let visitor_retention_secs = env::var("VISITOR_RETENTION_SECS")
            .unwrap_or_else(|_| "600".to_string())
            .parse()
            .unwrap_or(600);

        Ok(Config {
            host,
            port,
            database_path,
            cors_origins,
            admin_username,
            admin_password,
            post_rate_per_hour,
            post_burst,
            vote_rate_secs,
            vote_burst,
            sweep_interval_secs,
            visitor_retention_secs,
        })
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Token-bucket policy for content creation
    pub fn post_policy(&self) -> RatePolicy {
        RatePolicy::per_hour(self.post_rate_per_hour, self.post_burst)
    }

    /// Token-bucket policy for voting
    pub fn vote_policy(&self) -> RatePolicy {
        RatePolicy::per_seconds(self.vote_rate_secs, self.vote_burst)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn visitor_retention(&self) -> Duration {
        Duration::from_secs(self.visitor_retention_secs)
    }

    /// Check if admin endpoints are enabled
    pub fn is_admin_configured(&self) -> bool {
        !self.admin_username.is_empty() && !self.admin_password.is_empty()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "Invalid PORT environment variable"),
        }
    }
}

impl std::error::Error for ConfigError {}
