use serde_json::Value;

use crate::auth::AccessToken;
use crate::error::AppError;
use crate::types::{AddTracksRequest, CreatePlaylistRequest};

pub const DEFAULT_LIMIT: u32 = 20;
const MAX_RECOMMENDATIONS: u32 = 100;
const MAX_SEARCH_RESULTS: u32 = 50;
// The playlist items endpoint takes at most this many URIs per call.
const ADD_TRACKS_CHUNK: usize = 100;

/// Thin forwarder over the Web API. Every call is one request, no retries.
pub struct SpotifyClient {
    api_url: String,
    client: reqwest::Client,
}

impl SpotifyClient {
    pub fn new(api_url: String, client: reqwest::Client) -> Self {
        Self { api_url, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    async fn execute(
        &self,
        token: &AccessToken,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, AppError> {
        let response = request
            .header("Authorization", format!("Bearer {}", token.as_str()))
            .send()
            .await
            .map_err(|e| AppError::Network(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamRequestFailed {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn execute_json(
        &self,
        token: &AccessToken,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, AppError> {
        self.execute(token, request)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Network(format!("Parse failed: {}", e)))
    }

    pub async fn recommendations(
        &self,
        token: &AccessToken,
        seed_genres: &str,
        limit: u32,
    ) -> Result<Vec<Value>, AppError> {
        let limit = limit.clamp(1, MAX_RECOMMENDATIONS).to_string();
        let request = self
            .client
            .get(self.url("/recommendations"))
            .query(&[("seed_genres", seed_genres), ("limit", limit.as_str())]);

        let json = self.execute_json(token, request).await?;
        Ok(array_at(&json, &["tracks"]))
    }

    pub async fn current_user_id(&self, token: &AccessToken) -> Result<String, AppError> {
        let json = self
            .execute_json(token, self.client.get(self.url("/me")))
            .await?;
        json.get("id")
            .and_then(|id| id.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::Network("Parse failed: profile has no id".into()))
    }

    pub async fn create_playlist(
        &self,
        token: &AccessToken,
        user_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<Value, AppError> {
        let url = self.url(&format!("/users/{}/playlists", urlencoding::encode(user_id)));
        let payload = CreatePlaylistRequest {
            name,
            description,
            public,
        };
        self.execute_json(token, self.client.post(url).json(&payload))
            .await
    }

    pub async fn add_tracks(
        &self,
        token: &AccessToken,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), AppError> {
        let url = self.url(&format!("/playlists/{}/tracks", urlencoding::encode(playlist_id)));
        for chunk in uris.chunks(ADD_TRACKS_CHUNK) {
            let payload = AddTracksRequest { uris: chunk };
            self.execute(token, self.client.post(&url).json(&payload))
                .await?;
        }
        Ok(())
    }

    /// Returns the `tracks.items` array of a track search.
    pub async fn search_track(
        &self,
        token: &AccessToken,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Value>, AppError> {
        let limit = limit.clamp(1, MAX_SEARCH_RESULTS).to_string();
        let request = self
            .client
            .get(self.url("/search"))
            .query(&[("q", query), ("type", "track"), ("limit", limit.as_str())]);

        let json = self.execute_json(token, request).await?;
        Ok(array_at(&json, &["tracks", "items"]))
    }

    pub async fn queue_track(
        &self,
        token: &AccessToken,
        uri: &str,
        device_id: Option<&str>,
    ) -> Result<(), AppError> {
        let mut params = vec![("uri", uri)];
        if let Some(device_id) = device_id {
            params.push(("device_id", device_id));
        }
        let request = self
            .client
            .post(self.url("/me/player/queue"))
            .query(&params)
            .header("Content-Length", "0");

        self.execute(token, request).await?;
        Ok(())
    }
}

fn array_at(json: &Value, path: &[&str]) -> Vec<Value> {
    path.iter()
        .try_fold(json, |node, key| node.get(*key))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}
