use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::security::clock::{Clock, SystemClock};

/// Default token lifetime when the org does not tell us otherwise.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Token material handed back by an [`Authenticator`].
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: String,
    pub instance_url: String,
    /// Server-reported issue time, milliseconds since the epoch.
    pub issued_at_millis: i64,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("access_token", &"[REDACTED]")
            .field("instance_url", &self.instance_url)
            .field("issued_at_millis", &self.issued_at_millis)
            .finish()
    }
}

/// A bearer token together with the instance it is valid for.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub endpoint: String,
}

impl AccessToken {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Anything able to trade configured credentials for a fresh token.
#[allow(async_fn_in_trait)]
pub trait Authenticator: Send + Sync {
    async fn request_new_token(&self) -> Result<IssuedToken>;
}

#[derive(Clone)]
struct CachedCredential {
    token: String,
    endpoint: String,
    expires_at: DateTime<Utc>,
}

/// Memoized access token with expiry-based invalidation.
///
/// The slot is locked for the whole check-then-refresh sequence, so two
/// callers racing on an expired token trigger a single authentication.
pub struct TokenCache<A, C = SystemClock> {
    authenticator: A,
    clock: C,
    lifetime: Duration,
    slot: Mutex<Option<CachedCredential>>,
}

impl<A: Authenticator> TokenCache<A> {
    /// Create an empty cache using the system clock.
    pub fn new(authenticator: A, lifetime: Duration) -> Self {
        Self::with_clock(authenticator, SystemClock, lifetime)
    }
}

impl<A: Authenticator, C: Clock> TokenCache<A, C> {
    pub fn with_clock(authenticator: A, clock: C, lifetime: Duration) -> Self {
        Self {
            authenticator,
            clock,
            lifetime,
            slot: Mutex::new(None),
        }
    }

    /// Return the cached token, authenticating first if it is absent or expired.
    pub async fn get_token(&self) -> Result<AccessToken> {
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref() {
            if self.clock.now() < cached.expires_at {
                debug!(expires_at = %cached.expires_at, "using cached access token");
                return Ok(AccessToken {
                    token: cached.token.clone(),
                    endpoint: cached.endpoint.clone(),
                });
            }
            debug!(expires_at = %cached.expires_at, "cached access token expired");
        }

        let issued = self.authenticator.request_new_token().await?;
        let fresh = self.credential_from(
            issued.access_token,
            issued.instance_url,
            issued.issued_at_millis,
        )?;
        info!(
            endpoint = %fresh.endpoint,
            expires_at = %fresh.expires_at,
            "access token refreshed"
        );

        let token = AccessToken {
            token: fresh.token.clone(),
            endpoint: fresh.endpoint.clone(),
        };
        *slot = Some(fresh);
        Ok(token)
    }

    /// True when nothing is cached or `now >= expires_at`.
    pub async fn is_expired(&self) -> bool {
        match self.slot.lock().await.as_ref() {
            Some(cached) => self.clock.now() >= cached.expires_at,
            None => true,
        }
    }

    /// Store a token issued at `issued_at_millis`; it expires one lifetime later.
    pub async fn cache_token(
        &self,
        token: impl Into<String>,
        endpoint: impl Into<String>,
        issued_at_millis: i64,
    ) -> Result<()> {
        let fresh = self.credential_from(token.into(), endpoint.into(), issued_at_millis)?;
        *self.slot.lock().await = Some(fresh);
        Ok(())
    }

    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.slot.lock().await.as_ref().map(|c| c.expires_at)
    }

    /// Drop the cached credential; the next `get_token` authenticates.
    pub async fn clear(&self) {
        *self.slot.lock().await = None;
    }

    fn credential_from(
        &self,
        token: String,
        endpoint: String,
        issued_at_millis: i64,
    ) -> Result<CachedCredential> {
        if token.is_empty() {
            return Err(Error::MalformedResponse("access token is empty".into()));
        }
        if endpoint.is_empty() {
            return Err(Error::MalformedResponse("instance url is empty".into()));
        }
        let issued_at =
            DateTime::<Utc>::from_timestamp_millis(issued_at_millis).ok_or_else(|| {
                Error::MalformedResponse(format!("issued_at {issued_at_millis} is out of range"))
            })?;
        let expires_at = issued_at
            .checked_add_signed(self.lifetime)
            .ok_or_else(|| Error::MalformedResponse("token expiry overflows".into()))?;

        Ok(CachedCredential {
            token,
            endpoint,
            expires_at,
        })
    }
}
