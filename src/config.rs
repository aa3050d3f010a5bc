use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// PostgreSQL connection URL; the in-memory store is used when unset
    #[serde(default)]
    pub database_url: Option<String>,

    /// Maximum PostgreSQL pool size
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,

    /// HS256 secret used to verify bearer tokens
    pub jwt_secret: String,

    /// Origin allowed to send credentialed cross-origin requests
    #[serde(default)]
    pub cors_allowed_origin: Option<String>,

    /// Number of items returned by the personalized feed
    #[serde(default = "default_feed_page_size")]
    pub feed_page_size: usize,

    /// Number of most recent items considered when building a feed
    #[serde(default = "default_feed_candidate_window")]
    pub feed_candidate_window: usize,

    /// Maximum number of username suggestions
    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: usize,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_database_max_connections() -> u32 {
    5
}

fn default_feed_page_size() -> usize {
    20
}

fn default_feed_candidate_window() -> usize {
    500
}

fn default_suggestion_limit() -> usize {
    10
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Configuration suitable for tests and local experiments
    pub fn for_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: None,
            database_max_connections: default_database_max_connections(),
            jwt_secret: jwt_secret.into(),
            cors_allowed_origin: None,
            feed_page_size: default_feed_page_size(),
            feed_candidate_window: default_feed_candidate_window(),
            suggestion_limit: default_suggestion_limit(),
            host: default_host(),
            port: default_port(),
        }
    }

    /// Socket address the server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
