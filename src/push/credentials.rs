use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, Secret};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Upper bound on how long a fetched token is trusted, whatever the token
/// endpoint claims.
const MAX_TOKEN_LIFETIME_SECONDS: i64 = 3500;

#[derive(thiserror::Error, Debug)]
pub enum CredentialError {
    #[error("the service account credential is unusable: {0}")]
    Configuration(String),
    #[error("failed to sign the token assertion")]
    Signing(#[source] anyhow::Error),
    #[error("the token endpoint did not issue an access token")]
    Exchange(#[source] anyhow::Error),
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A bearer credential for the push gateway. Cloning is cheap and the value
/// never shows up in `Debug` output.
#[derive(Clone)]
pub struct BearerToken(Arc<Secret<String>>);

impl BearerToken {
    pub fn new(value: String) -> Self {
        Self(Arc::new(Secret::new(value)))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

/// A token straight from the token endpoint.
pub struct FreshToken {
    pub access_token: String,
    pub expires_in: i64,
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<FreshToken, CredentialError>;
}

struct CachedCredential {
    token: BearerToken,
    expires_at: DateTime<Utc>,
}

/// Hands out the current bearer token, going back to the `TokenSource` only
/// once the cached one is within `refresh_margin` of expiring. Callers queue on
/// the slot so a refresh is never duplicated.
pub struct CredentialCache {
    source: Box<dyn TokenSource>,
    clock: Arc<dyn Clock>,
    refresh_margin: Duration,
    slot: Mutex<Option<CachedCredential>>,
}

impl CredentialCache {
    pub fn new(
        source: Box<dyn TokenSource>,
        clock: Arc<dyn Clock>,
        refresh_margin: Duration,
    ) -> Self {
        Self {
            source,
            clock,
            refresh_margin,
            slot: Mutex::new(None),
        }
    }

    #[tracing::instrument(name = "Get push gateway bearer token", skip(self))]
    pub async fn get_bearer_token(&self) -> Result<BearerToken, CredentialError> {
        let mut slot = self.slot.lock().await;
        let now = self.clock.now();
        if let Some(cached) = slot.as_ref() {
            if now < cached.expires_at - self.refresh_margin {
                return Ok(cached.token.clone());
            }
        }

        let fresh = self.source.fetch().await?;
        let lifetime = fresh.expires_in.clamp(0, MAX_TOKEN_LIFETIME_SECONDS);
        let token = BearerToken::new(fresh.access_token);
        *slot = Some(CachedCredential {
            token: token.clone(),
            expires_at: now + Duration::seconds(lifetime),
        });
        tracing::info!(lifetime_seconds = lifetime, "Cached a new bearer token");
        Ok(token)
    }

    /// Drops the cached token so the next caller fetches a new one.
    pub async fn invalidate(&self) {
        self.slot.lock().await.take();
    }
}
