use serde::{Deserialize, Serialize};

/// Body of the accounts service token endpoint, for both grant types.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationsQuery {
    pub prompt: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistRequest {
    pub name: Option<String>,
    pub prompt: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub public: bool,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct QueueRequest {
    pub uri: Option<String>,
    pub track_name: Option<String>,
    pub device_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatePlaylistRequest<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub public: bool,
}

#[derive(Debug, Serialize)]
pub struct AddTracksRequest<'a> {
    pub uris: &'a [String],
}

#[derive(Debug, Serialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub expires_in_secs: Option<u64>,
    pub expires_at: Option<String>,
}
