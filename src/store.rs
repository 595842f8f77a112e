use dashmap::DashMap;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

const STATE_LEN: usize = 32;
// Upper bound on a token lifetime so the expiry instant cannot overflow.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone, Debug)]
pub struct TokenRecord {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Instant,
}

impl TokenRecord {
    fn empty() -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            expires_at: Instant::now(),
        }
    }
}

/// The single token record for this process. Lives as long as the server.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<Mutex<TokenRecord>>,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(TokenRecord::empty())),
        }
    }

    // Nothing that can panic runs while the lock is held, so a poisoned
    // mutex still guards a consistent record.
    fn lock(&self) -> MutexGuard<'_, TokenRecord> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> TokenRecord {
        self.lock().clone()
    }

    pub fn store_exchange(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        expires_in: u64,
    ) {
        let lifetime = Duration::from_secs(expires_in).min(MAX_TOKEN_LIFETIME);
        let expires_at = Instant::now() + lifetime;

        let mut record = self.lock();
        record.access_token = Some(access_token);
        if refresh_token.is_some() {
            record.refresh_token = refresh_token;
        }
        record.expires_at = expires_at;
    }

    #[cfg(test)]
    pub fn replace(&self, record: TokenRecord) {
        *self.lock() = record;
    }
}

/// Outstanding login states, keyed by value with their creation time.
#[derive(Clone)]
pub struct PendingStates {
    states: Arc<DashMap<String, Instant>>,
    ttl: Duration,
}

impl PendingStates {
    pub fn new(ttl: Duration) -> Self {
        Self {
            states: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn issue(&self) -> String {
        let state: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(STATE_LEN)
            .map(char::from)
            .collect();
        self.states.insert(state.clone(), Instant::now());
        state
    }

    /// Removes the state and reports whether it was outstanding and still
    /// within its TTL.
    pub fn consume(&self, state: &str) -> bool {
        match self.states.remove(state) {
            Some((_, issued_at)) => issued_at.elapsed() < self.ttl,
            None => false,
        }
    }

    /// Drops states older than the TTL. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let before = self.states.len();
        let ttl = self.ttl;
        self.states.retain(|_, issued_at| issued_at.elapsed() < ttl);
        before.saturating_sub(self.states.len())
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[cfg(test)]
    pub fn insert_issued_at(&self, state: &str, issued_at: Instant) {
        self.states.insert(state.to_string(), issued_at);
    }
}
