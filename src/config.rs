//! Server configuration, loaded from environment variables.

use std::path::PathBuf;

/// Runtime configuration for the server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Directory for the JSON document store.
    pub data_dir: PathBuf,
    /// When true, auth checks are bypassed with a fixed dev identity.
    pub dev_mode: bool,
    /// HS256 signing key. Required unless `dev_mode`.
    pub jwt_secret: Option<String>,
    /// Token lifetime in days.
    pub jwt_ttl_days: i64,
    /// API key for the AI capability. Assist operations fail without it.
    pub groq_api_key: Option<String>,
    /// Chat model used for all assist calls.
    pub groq_model: String,
    /// Hard timeout applied to every AI call (single attempt, no retry).
    pub ai_timeout_secs: u64,
}

impl Config {
    /// Load configuration from the environment, validating required fields.
    pub fn from_env() -> anyhow::Result<Self> {
        let dev_mode = env_flag("DEV_MODE");
        let jwt_secret = std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty());

        if !dev_mode && jwt_secret.is_none() {
            anyhow::bail!("JWT_SECRET must be set when DEV_MODE is not enabled");
        }

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(4000),
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            dev_mode,
            jwt_secret,
            jwt_ttl_days: std::env::var("JWT_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            groq_api_key: std::env::var("GROQ_API_KEY").ok().filter(|s| !s.is_empty()),
            groq_model: std::env::var("GROQ_MODEL")
                .unwrap_or_else(|_| "llama-3.1-8b-instant".to_string()),
            ai_timeout_secs: std::env::var("AI_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        })
    }

    /// Whether API requests must carry a valid bearer token.
    pub fn auth_required(&self) -> bool {
        !self.dev_mode
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
