use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::AppError;
use crate::store::{PendingStates, TokenStore};
use crate::types::{AuthStatus, CallbackParams, TokenResponse};

/// Refresh once the token is this close to expiring.
const REFRESH_MARGIN: Duration = Duration::from_secs(10);

/// A bearer token handed out by [`Authenticator::require_authenticated`].
#[derive(Clone, Debug)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[cfg(test)]
    pub fn new(token: &str) -> Self {
        Self(token.to_string())
    }
}

enum TokenRequestError {
    Rejected { status: u16, body: String },
    Network(String),
}

/// Owns the OAuth authorization-code flow and the process token record.
pub struct Authenticator {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: String,
    accounts_url: String,
    client: reqwest::Client,
    tokens: TokenStore,
    states: PendingStates,
}

impl Authenticator {
    pub fn new(config: &Config, client: reqwest::Client) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
            accounts_url: config.accounts_url.clone(),
            client,
            tokens: TokenStore::new(),
            states: PendingStates::new(config.state_ttl),
        }
    }

    pub fn states(&self) -> &PendingStates {
        &self.states
    }

    #[cfg(test)]
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Issues a new login state and returns the authorize URL to redirect to.
    pub fn start_authorization(&self) -> String {
        let state = self.states.issue();
        format!(
            "{}/authorize?client_id={}&response_type=code&redirect_uri={}&scope={}&state={}",
            self.accounts_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.scopes),
            state
        )
    }

    /// Validates the callback state, then swaps the code for a token pair.
    pub async fn complete_authorization(&self, params: CallbackParams) -> Result<(), AppError> {
        let state = params.state.ok_or(AppError::InvalidState)?;
        if !self.states.consume(&state) {
            return Err(AppError::InvalidState);
        }

        if let Some(error) = params.error {
            return Err(AppError::AuthorizationDenied(error));
        }
        let code = params
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::ValidationFailed("missing authorization code".into()))?;

        let token = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .await
            .map_err(|e| match e {
                TokenRequestError::Rejected { status, body } => {
                    AppError::TokenExchangeFailed { status, body }
                }
                TokenRequestError::Network(msg) => AppError::Network(msg),
            })?;

        self.tokens
            .store_exchange(token.access_token, token.refresh_token, token.expires_in);
        info!("Authorization complete, token valid for {}s", token.expires_in);
        Ok(())
    }

    /// Refreshes the access token when it is within the refresh margin of
    /// expiring. A failed refresh leaves the stored record as it was.
    pub async fn ensure_fresh(&self) -> Result<(), AppError> {
        let record = self.tokens.snapshot();
        let Some(refresh_token) = record.refresh_token else {
            return Ok(());
        };
        if Instant::now() + REFRESH_MARGIN < record.expires_at {
            return Ok(());
        }

        debug!("Access token near expiry, refreshing");
        let token = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .await
            .map_err(|e| match e {
                TokenRequestError::Rejected { status, body } => {
                    AppError::RefreshFailed(format!("{} - {}", status, body))
                }
                TokenRequestError::Network(msg) => AppError::RefreshFailed(msg),
            })?;

        self.tokens
            .store_exchange(token.access_token, token.refresh_token, token.expires_in);
        info!("Access token refreshed, valid for {}s", token.expires_in);
        Ok(())
    }

    /// Gate for every `/api` route.
    pub async fn require_authenticated(&self) -> Result<AccessToken, AppError> {
        if self.tokens.snapshot().access_token.is_none() {
            return Err(AppError::NotAuthenticated);
        }
        self.ensure_fresh().await?;
        self.tokens
            .snapshot()
            .access_token
            .map(AccessToken)
            .ok_or(AppError::NotAuthenticated)
    }

    pub fn status(&self) -> AuthStatus {
        let record = self.tokens.snapshot();
        if record.access_token.is_none() {
            return AuthStatus {
                authenticated: false,
                expires_in_secs: None,
                expires_at: None,
            };
        }
        let remaining = record.expires_at.saturating_duration_since(Instant::now());
        AuthStatus {
            authenticated: true,
            expires_in_secs: Some(remaining.as_secs()),
            expires_at: (OffsetDateTime::now_utc() + remaining).format(&Rfc3339).ok(),
        }
    }

    async fn request_token(
        &self,
        params: &[(&str, &str)],
    ) -> Result<TokenResponse, TokenRequestError> {
        let auth = BASE64_STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let url = format!("{}/api/token", self.accounts_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Basic {}", auth))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(params)
            .send()
            .await
            .map_err(|e| TokenRequestError::Network(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenRequestError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| TokenRequestError::Network(format!("Parse failed: {}", e)))
    }
}
