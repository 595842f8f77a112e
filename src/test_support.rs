//! In-process stand-in for the accounts service and Web API. Every request it
//! receives is recorded as a name plus a flat map of its parameters.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::auth::{AccessToken, Authenticator};
use crate::config::{Config, DEFAULT_SCOPES};
use crate::routes::AppContext;
use crate::spotify::SpotifyClient;
use crate::store::TokenRecord;

type Params = HashMap<String, String>;

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(&'static str, Params)>>,
    fail_token: AtomicBool,
    fail_queue: AtomicBool,
}

impl Recorder {
    fn record(&self, name: &'static str, headers: &HeaderMap, mut params: Params) {
        if let Some(auth) = headers.get("authorization").and_then(|h| h.to_str().ok()) {
            params.insert("authorization".into(), auth.to_string());
        }
        self.calls.lock().unwrap().push((name, params));
    }
}

pub struct FakeUpstream {
    pub base_url: String,
    recorder: Arc<Recorder>,
}

impl FakeUpstream {
    pub async fn start() -> Self {
        let recorder = Arc::new(Recorder::default());
        let app = Router::new()
            .route("/api/token", post(token))
            .route("/v1/recommendations", get(recommendations))
            .route("/v1/me", get(me))
            .route("/v1/users/:user_id/playlists", post(create_playlist))
            .route("/v1/playlists/:playlist_id/tracks", post(add_tracks))
            .route("/v1/search", get(search))
            .route("/v1/me/player/queue", post(queue))
            .with_state(recorder.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            recorder,
        }
    }

    pub fn config(&self) -> Config {
        Config {
            client_id: "test-client".into(),
            client_secret: "test-secret".into(),
            redirect_uri: "http://127.0.0.1:3000/callback".into(),
            port: 3000,
            scopes: DEFAULT_SCOPES.into(),
            accounts_url: self.base_url.clone(),
            api_url: format!("{}/v1", self.base_url),
            state_ttl: Duration::from_secs(600),
        }
    }

    pub fn authenticator(&self) -> Authenticator {
        Authenticator::new(&self.config(), reqwest::Client::new())
    }

    pub fn spotify_client(&self) -> SpotifyClient {
        SpotifyClient::new(format!("{}/v1", self.base_url), reqwest::Client::new())
    }

    pub fn context(&self) -> AppContext {
        AppContext::new(&self.config())
    }

    /// A context holding a token that is nowhere near expiry.
    pub fn authenticated_context(&self) -> AppContext {
        let ctx = self.context();
        ctx.auth.tokens().replace(TokenRecord {
            access_token: Some("test-access".into()),
            refresh_token: Some("test-refresh".into()),
            expires_at: Instant::now() + Duration::from_secs(3600),
        });
        ctx
    }

    pub fn token() -> AccessToken {
        AccessToken::new("test-access")
    }

    pub fn fail_token_endpoint(&self) {
        self.recorder.fail_token.store(true, Ordering::SeqCst);
    }

    pub fn fail_queue_endpoint(&self) {
        self.recorder.fail_queue.store(true, Ordering::SeqCst);
    }

    pub fn count(&self, name: &str) -> usize {
        let calls = self.recorder.calls.lock().unwrap();
        calls.iter().filter(|(n, _)| *n == name).count()
    }

    pub fn total_calls(&self) -> usize {
        self.recorder.calls.lock().unwrap().len()
    }

    pub fn last_form(&self, name: &str) -> Option<Params> {
        let calls = self.recorder.calls.lock().unwrap();
        calls
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, p)| p.clone())
    }
}

async fn token(
    State(recorder): State<Arc<Recorder>>,
    headers: HeaderMap,
    Form(form): Form<Params>,
) -> (StatusCode, Json<Value>) {
    let grant_type = form.get("grant_type").cloned().unwrap_or_default();
    recorder.record("token", &headers, form);

    if recorder.fail_token.load(Ordering::SeqCst) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant", "error_description": "Invalid code" })),
        );
    }

    let body = if grant_type == "refresh_token" {
        json!({ "access_token": "refreshed-access", "token_type": "Bearer", "expires_in": 3600 })
    } else {
        json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "token_type": "Bearer",
            "scope": DEFAULT_SCOPES,
            "expires_in": 3600
        })
    };
    (StatusCode::OK, Json(body))
}

async fn recommendations(
    State(recorder): State<Arc<Recorder>>,
    headers: HeaderMap,
    Query(query): Query<Params>,
) -> Json<Value> {
    recorder.record("recommendations", &headers, query);
    Json(json!({
        "seeds": [],
        "tracks": [
            { "id": "t1", "uri": "spotify:track:t1", "name": "One" },
            { "id": "t2", "uri": "spotify:track:t2", "name": "Two" }
        ]
    }))
}

async fn me(State(recorder): State<Arc<Recorder>>, headers: HeaderMap) -> Json<Value> {
    recorder.record("me", &headers, Params::new());
    Json(json!({ "id": "user-1", "display_name": "Test User" }))
}

async fn create_playlist(
    State(recorder): State<Arc<Recorder>>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let name = body["name"].as_str().unwrap_or_default().to_string();
    let mut params = Params::new();
    params.insert("user_id".into(), user_id);
    params.insert("name".into(), name.clone());
    params.insert(
        "description".into(),
        body["description"].as_str().unwrap_or_default().to_string(),
    );
    recorder.record("create_playlist", &headers, params);

    (
        StatusCode::CREATED,
        Json(json!({
            "id": "pl-1",
            "name": name,
            "external_urls": { "spotify": "https://open.spotify.com/playlist/pl-1" }
        })),
    )
}

async fn add_tracks(
    State(recorder): State<Arc<Recorder>>,
    Path(playlist_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let uris: Vec<&str> = body["uris"]
        .as_array()
        .map(|a| a.iter().filter_map(|u| u.as_str()).collect())
        .unwrap_or_default();
    let mut params = Params::new();
    params.insert("playlist_id".into(), playlist_id);
    params.insert("uris".into(), uris.join(","));
    recorder.record("add_tracks", &headers, params);

    (StatusCode::CREATED, Json(json!({ "snapshot_id": "snap-1" })))
}

async fn search(
    State(recorder): State<Arc<Recorder>>,
    headers: HeaderMap,
    Query(query): Query<Params>,
) -> Json<Value> {
    let q = query.get("q").cloned().unwrap_or_default();
    recorder.record("search", &headers, query);

    let items = if q.contains("nonexistent") {
        vec![]
    } else {
        vec![json!({ "id": "found", "uri": "spotify:track:found", "name": q })]
    };
    let total = items.len();
    Json(json!({ "tracks": { "items": items, "total": total } }))
}

async fn queue(
    State(recorder): State<Arc<Recorder>>,
    headers: HeaderMap,
    Query(query): Query<Params>,
) -> (StatusCode, Json<Value>) {
    recorder.record("queue", &headers, query);

    if recorder.fail_queue.load(Ordering::SeqCst) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": {
                    "status": 404,
                    "message": "Player command failed: No active device found",
                    "reason": "NO_ACTIVE_DEVICE"
                }
            })),
        );
    }
    (StatusCode::OK, Json(json!({})))
}
