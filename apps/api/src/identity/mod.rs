//! Bearer-token verification against Firebase Authentication.

pub mod middleware;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::errors::AppError;

pub use middleware::{require_auth, AuthUser};

const GOOGLE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const JWKS_TTL: Duration = Duration::from_secs(3600);
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

pub const INVALID_TOKEN: &str = "Invalid authentication token";

/// Identity of the caller, as asserted by a verified token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Claims, AppError>;
}

#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// Where signing keys come from.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, AppError>;
}

/// Google's published securetoken key set.
pub struct GoogleKeySource {
    client: Client,
}

impl GoogleKeySource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KeySource for GoogleKeySource {
    async fn fetch(&self) -> Result<JwkSet, AppError> {
        let response = self
            .client
            .get(GOOGLE_JWKS_URL)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Upstream(format!("JWKS fetch failed: {e}")))?;
        let keys: JwkSet = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("JWKS payload unreadable: {e}")))?;
        info!("Fetched {} identity provider signing keys", keys.keys.len());
        Ok(keys)
    }
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

#[derive(Default)]
struct KeyState {
    cached: Option<CachedKeys>,
    last_attempt: Option<Instant>,
}

impl KeyState {
    fn fresh_key(&self, kid: &str, max_age: Duration) -> Option<&Jwk> {
        self.cached
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < max_age)
            .and_then(|cached| cached.keys.find(kid))
    }
}

fn to_decoding_key(jwk: &Jwk) -> Result<DecodingKey, AppError> {
    DecodingKey::from_jwk(jwk).map_err(|_| AppError::Unauthorized(INVALID_TOKEN.into()))
}

/// Verifies Firebase ID tokens (RS256) using Google's published signing keys.
pub struct FirebaseTokenVerifier {
    source: Box<dyn KeySource>,
    project_id: String,
    keys: RwLock<KeyState>,
}

impl FirebaseTokenVerifier {
    pub fn new(client: Client, project_id: String) -> Self {
        Self::with_source(Box::new(GoogleKeySource::new(client)), project_id)
    }

    pub fn with_source(source: Box<dyn KeySource>, project_id: String) -> Self {
        Self {
            source,
            project_id,
            keys: RwLock::new(KeyState::default()),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[format!(
            "https://securetoken.google.com/{}",
            self.project_id
        )]);
        validation.leeway = 30;
        validation
    }

    /// Returns the key for `kid`, refetching the set when it is stale or
    /// does not contain that key (Google rotates keys regularly). Refetches
    /// are at most one per `MIN_REFRESH_INTERVAL`.
    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AppError> {
        if let Some(jwk) = self.keys.read().await.fresh_key(kid, JWKS_TTL) {
            return to_decoding_key(jwk);
        }

        let mut state = self.keys.write().await;
        if let Some(jwk) = state.fresh_key(kid, JWKS_TTL) {
            return to_decoding_key(jwk);
        }
        if let Some(last) = state.last_attempt {
            if last.elapsed() < MIN_REFRESH_INTERVAL {
                debug!("Skipping key refresh for unknown key id {kid}");
                return Err(AppError::Unauthorized(INVALID_TOKEN.into()));
            }
        }

        state.last_attempt = Some(Instant::now());
        let fresh = self.source.fetch().await?;
        state.cached = Some(CachedKeys {
            keys: fresh,
            fetched_at: Instant::now(),
        });

        match state.fresh_key(kid, JWKS_TTL) {
            Some(jwk) => to_decoding_key(jwk),
            None => {
                warn!("Token signed with unknown key id {kid}");
                Err(AppError::Unauthorized(INVALID_TOKEN.into()))
            }
        }
    }
}

#[async_trait]
impl TokenVerifier for FirebaseTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let header =
            decode_header(token).map_err(|_| AppError::Unauthorized(INVALID_TOKEN.into()))?;
        let kid = header
            .kid
            .ok_or_else(|| AppError::Unauthorized(INVALID_TOKEN.into()))?;
        let key = self.decoding_key(&kid).await?;

        let decoded = decode::<FirebaseClaims>(token, &key, &self.validation()).map_err(|e| {
            debug!("Token verification failed: {e}");
            AppError::Unauthorized(INVALID_TOKEN.into())
        })?;

        let claims = decoded.claims;
        if claims.sub.is_empty() {
            return Err(AppError::Unauthorized(INVALID_TOKEN.into()));
        }
        Ok(Claims {
            uid: claims.sub,
            email: claims.email,
            name: claims.name,
            picture: claims.picture,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use jsonwebtoken::{encode, EncodingKey, Header};

    use super::*;

    struct CountingSource(Arc<AtomicUsize>);

    #[async_trait]
    impl KeySource for CountingSource {
        async fn fetch(&self) -> Result<JwkSet, AppError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(JwkSet { keys: Vec::new() })
        }
    }

    fn token_with_kid(kid: &str) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(kid.to_string());
        let claims = serde_json::json!({ "sub": "u1" });
        encode(&header, &claims, &EncodingKey::from_secret(b"secret")).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_key_ids_refresh_keys_once_per_interval() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let verifier = FirebaseTokenVerifier::with_source(
            Box::new(CountingSource(fetches.clone())),
            "demo-project".into(),
        );

        for kid in ["rotated-1", "rotated-2"] {
            let err = verifier.verify(&token_with_kid(kid)).await.unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(msg) if msg == INVALID_TOKEN));
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_token_is_rejected_before_any_fetch() {
        let verifier = FirebaseTokenVerifier::new(Client::new(), "demo-project".into());
        let err = verifier.verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == INVALID_TOKEN));
    }

    #[test]
    fn test_validation_pins_project_audience_and_issuer() {
        let verifier = FirebaseTokenVerifier::new(Client::new(), "demo-project".into());
        let validation = verifier.validation();
        assert_eq!(validation.algorithms, vec![Algorithm::RS256]);
        assert!(validation
            .iss
            .as_ref()
            .unwrap()
            .contains("https://securetoken.google.com/demo-project"));
        assert!(validation.aud.as_ref().unwrap().contains("demo-project"));
    }
}
