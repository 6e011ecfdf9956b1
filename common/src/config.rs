use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub server_url: String,
    pub vault_dir: PathBuf,
    pub poll_interval: Duration,
    pub session_ttl: Duration,
    pub request_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".to_string(),
            vault_dir: PathBuf::from(".device-vault"),
            poll_interval: Duration::from_secs(2),
            session_ttl: Duration::from_secs(300),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_url: std::env::var("DEVICE_AUTH_SERVER_URL")
                .unwrap_or(defaults.server_url),
            vault_dir: std::env::var("DEVICE_AUTH_VAULT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.vault_dir),
            poll_interval: env_secs("DEVICE_AUTH_POLL_INTERVAL_SECS")
                .unwrap_or(defaults.poll_interval),
            session_ttl: env_secs("DEVICE_AUTH_SESSION_TTL_SECS")
                .unwrap_or(defaults.session_ttl),
            request_timeout: defaults.request_timeout,
        }
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
}
