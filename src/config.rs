use std::time::Duration;
use tracing::warn;

pub const DEFAULT_SCOPES: &str =
    "playlist-modify-public playlist-modify-private user-modify-playback-state";
pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort(String),
    InvalidStateTtl(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidPort(v) => write!(f, "PORT must be a valid u16, got {:?}", v),
            ConfigError::InvalidStateTtl(v) => {
                write!(f, "LOGIN_STATE_TTL_SECS must be a number of seconds, got {:?}", v)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone, Debug)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub port: u16,
    pub scopes: String,
    pub accounts_url: String,
    pub api_url: String,
    pub state_ttl: Duration,
}

impl Config {
    /// Reads the process environment. Missing Spotify credentials only produce
    /// warnings so the server can still come up for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => 3000,
        };

        let client_id = lookup("SPOTIFY_CLIENT_ID").unwrap_or_default();
        if client_id.is_empty() {
            warn!("SPOTIFY_CLIENT_ID not set - /login will not produce a usable authorize URL");
        }
        let client_secret = lookup("SPOTIFY_CLIENT_SECRET").unwrap_or_default();
        if client_secret.is_empty() {
            warn!("SPOTIFY_CLIENT_SECRET not set - token exchange will be rejected upstream");
        }
        let redirect_uri = lookup("SPOTIFY_REDIRECT_URI")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| {
                let fallback = format!("http://127.0.0.1:{}/callback", port);
                warn!("SPOTIFY_REDIRECT_URI not set - using {}", fallback);
                fallback
            });

        let state_ttl = match lookup("LOGIN_STATE_TTL_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidStateTtl(raw))?,
            None => Duration::from_secs(600),
        };

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
            port,
            scopes: lookup("SPOTIFY_SCOPES").unwrap_or_else(|| DEFAULT_SCOPES.to_string()),
            accounts_url: trim_base(
                lookup("SPOTIFY_ACCOUNTS_URL").unwrap_or_else(|| DEFAULT_ACCOUNTS_URL.to_string()),
            ),
            api_url: trim_base(
                lookup("SPOTIFY_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            ),
            state_ttl,
        })
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
