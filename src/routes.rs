use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Redirect},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::auth::Authenticator;
use crate::config::Config;
use crate::error::AppError;
use crate::mood::map_prompt_to_seeds;
use crate::resolve::{normalize_track_uri, parse_track_id};
use crate::spotify::{SpotifyClient, DEFAULT_LIMIT};
use crate::types::{
    AuthStatus, CallbackParams, PlaylistRequest, QueueRequest, RecommendationsQuery, SearchQuery,
};

/// Everything a handler needs, built once in `main` and shared by clone.
#[derive(Clone)]
pub struct AppContext {
    pub auth: Arc<Authenticator>,
    pub spotify: Arc<SpotifyClient>,
}

impl AppContext {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::new();
        Self {
            auth: Arc::new(Authenticator::new(config, client.clone())),
            spotify: Arc::new(SpotifyClient::new(config.api_url.clone(), client)),
        }
    }
}

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/login", get(login_handler))
        .route("/callback", get(callback_handler))
        .route("/api/status", get(status_handler))
        .route("/api/recommendations", get(recommendations_handler))
        .route("/api/playlist", post(playlist_handler))
        .route("/api/queue", post(queue_handler))
        .route("/api/search", get(search_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn login_handler(State(ctx): State<AppContext>) -> Redirect {
    let url = ctx.auth.start_authorization();
    info!(
        "Starting login, {} pending state(s)",
        ctx.auth.states().len()
    );
    Redirect::to(&url)
}

async fn callback_handler(
    State(ctx): State<AppContext>,
    params: Result<Query<CallbackParams>, QueryRejection>,
) -> Result<Html<&'static str>, AppError> {
    let Query(params) = params?;
    ctx.auth.complete_authorization(params).await?;
    Ok(Html(
        r#"
        <html>
            <body>
                <h1>Authenticated</h1>
                <p>You can close this window.</p>
            </body>
        </html>
        "#,
    ))
}

async fn status_handler(State(ctx): State<AppContext>) -> Json<AuthStatus> {
    Json(ctx.auth.status())
}

async fn recommendations_handler(
    State(ctx): State<AppContext>,
    params: Result<Query<RecommendationsQuery>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let token = ctx.auth.require_authenticated().await?;
    let Query(params) = params?;
    let mood = map_prompt_to_seeds(params.prompt.as_deref());

    let tracks = ctx
        .spotify
        .recommendations(
            &token,
            &mood.seed_genres(),
            params.limit.unwrap_or(DEFAULT_LIMIT),
        )
        .await?;

    Ok(Json(json!({ "tracks": tracks, "mood": mood })))
}

async fn playlist_handler(
    State(ctx): State<AppContext>,
    request: Result<Json<PlaylistRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let token = ctx.auth.require_authenticated().await?;
    let Json(request) = request?;
    let name = request
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::ValidationFailed("playlist name is required".into()))?;

    let mood = map_prompt_to_seeds(request.prompt.as_deref());
    let description = request
        .description
        .clone()
        .unwrap_or_else(|| format!("Mood: {}", mood.description));

    let tracks = ctx
        .spotify
        .recommendations(
            &token,
            &mood.seed_genres(),
            request.limit.unwrap_or(DEFAULT_LIMIT),
        )
        .await?;
    let uris: Vec<String> = tracks
        .iter()
        .filter_map(|t| t.get("uri").and_then(|u| u.as_str()))
        .map(|u| u.to_string())
        .collect();

    let user_id = ctx.spotify.current_user_id(&token).await?;
    let playlist = ctx
        .spotify
        .create_playlist(&token, &user_id, name, &description, request.public)
        .await?;
    let playlist_id = playlist
        .get("id")
        .and_then(|id| id.as_str())
        .ok_or_else(|| AppError::Network("Parse failed: playlist has no id".into()))?;

    ctx.spotify.add_tracks(&token, playlist_id, &uris).await?;
    info!("Created playlist {} with {} track(s)", playlist_id, uris.len());

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "playlist": {
                "id": playlist_id,
                "name": playlist.get("name").cloned().unwrap_or(Value::Null),
                "url": playlist
                    .get("external_urls")
                    .and_then(|u| u.get("spotify"))
                    .cloned()
                    .unwrap_or(Value::Null),
            },
            "tracks_added": uris.len(),
            "mood": mood,
        })),
    ))
}

async fn queue_handler(
    State(ctx): State<AppContext>,
    request: Result<Json<QueueRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let token = ctx.auth.require_authenticated().await?;
    let Json(request) = request?;

    let uri = request.uri.as_deref().map(str::trim).filter(|u| !u.is_empty());
    let track_name = request
        .track_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let (uri, name) = match (uri, track_name) {
        (Some(uri), _) => (normalize_track_uri(uri), None),
        (None, Some(name)) if parse_track_id(name).is_some() => (normalize_track_uri(name), None),
        (None, Some(name)) => {
            let items = ctx.spotify.search_track(&token, name, 1).await?;
            let track = items
                .first()
                .ok_or_else(|| AppError::TrackNotFound(name.to_string()))?;
            let uri = track
                .get("uri")
                .and_then(|u| u.as_str())
                .ok_or_else(|| AppError::TrackNotFound(name.to_string()))?;
            (uri.to_string(), track.get("name").cloned())
        }
        (None, None) => {
            return Err(AppError::ValidationFailed(
                "either uri or track_name is required".into(),
            ))
        }
    };

    ctx.spotify
        .queue_track(&token, &uri, request.device_id.as_deref())
        .await?;
    info!("Queued {}", uri);

    Ok(Json(json!({
        "queued": uri,
        "name": name.unwrap_or(Value::Null),
    })))
}

async fn search_handler(
    State(ctx): State<AppContext>,
    params: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let token = ctx.auth.require_authenticated().await?;
    let Query(params) = params?;
    let q = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::ValidationFailed("query 'q' is required".into()))?;

    let tracks = ctx
        .spotify
        .search_track(&token, q, params.limit.unwrap_or(DEFAULT_LIMIT))
        .await?;
    Ok(Json(json!({ "tracks": tracks })))
}
