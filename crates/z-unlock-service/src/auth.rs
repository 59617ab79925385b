//! Authentication extractors.
//!
//! - `AuthUser`: end users, via ZID JWT validated against a cached JWKS
//! - `AdminAuth`: support tooling, via the `X-Admin-Key` header

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;

use z_unlock_core::UserId;

use crate::error::ApiError;
use crate::state::AppState;

/// How long to cache JWKS keys before refreshing.
const JWKS_CACHE_DURATION: Duration = Duration::from_secs(3600);

/// Timeout for JWKS fetch requests.
const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// An authenticated user extracted from a ZID JWT token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user ID.
    pub user_id: UserId,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        // Test tokens are compiled in only for tests and the "test-auth" feature.
        #[cfg(any(test, feature = "test-auth"))]
        if let Some(user_id) = token.strip_prefix("test-token:") {
            let user_id = user_id
                .parse::<UserId>()
                .map_err(|_| ApiError::Unauthorized)?;
            return Ok(Self { user_id });
        }

        let claims = state.jwks.validate(token, &state.config).await?;
        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(Self { user_id })
    }
}

/// Admin authentication via the `X-Admin-Key` header.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    /// Admin identifier (for audit logging).
    pub admin_id: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let admin_key = parts
            .headers
            .get("x-admin-key")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let expected_key = state
            .config
            .admin_api_key
            .as_deref()
            .ok_or(ApiError::Unauthorized)?;

        if !crate::crypto::constant_time_eq(admin_key, expected_key) {
            return Err(ApiError::Unauthorized);
        }

        let admin_id = parts
            .headers
            .get("x-admin-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("admin")
            .to_string();

        tracing::info!(admin_id = %admin_id, "Admin authenticated");

        Ok(Self { admin_id })
    }
}

/// JWT claims we rely on.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Expiration time.
    pub exp: i64,
}

/// JWKS (JSON Web Key Set) response structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwks {
    /// List of JWK keys.
    pub keys: Vec<Jwk>,
}

/// Single JSON Web Key.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type (e.g., "RSA").
    pub kty: String,
    /// Key ID.
    pub kid: Option<String>,
    /// RSA public key modulus (base64url encoded).
    pub n: Option<String>,
    /// RSA public key exponent (base64url encoded).
    pub e: Option<String>,
}

struct CachedKeys {
    keys: HashMap<String, DecodingKey>,
    default_key: Option<DecodingKey>,
    fetched_at: Option<Instant>,
}

impl CachedKeys {
    fn is_fresh(&self) -> bool {
        self.fetched_at
            .is_some_and(|at| at.elapsed() < JWKS_CACHE_DURATION)
    }

    fn get(&self, kid: Option<&str>) -> Option<DecodingKey> {
        match kid {
            Some(kid) => self.keys.get(kid).cloned(),
            None => self.default_key.clone(),
        }
    }
}

/// Cache of the auth provider's signing keys.
pub struct JwksCache {
    client: reqwest::Client,
    cached: RwLock<CachedKeys>,
}

impl JwksCache {
    /// Create an empty cache; keys are fetched on first use.
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(JWKS_FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            cached: RwLock::new(CachedKeys {
                keys: HashMap::new(),
                default_key: None,
                fetched_at: None,
            }),
        }
    }

    /// Validate a JWT (RS256) against the configured issuer and audience.
    async fn validate(
        &self,
        token: &str,
        config: &crate::config::ServiceConfig,
    ) -> Result<JwtClaims, ApiError> {
        let header = decode_header(token).map_err(|e| {
            tracing::debug!(error = %e, "Failed to decode JWT header");
            ApiError::Unauthorized
        })?;

        let key = self
            .decoding_key(header.kid.as_deref(), &config.auth_base_url)
            .await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&config.auth_audience]);
        validation.set_issuer(&[&config.auth_base_url]);

        decode::<JwtClaims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "JWT validation failed");
                ApiError::Unauthorized
            })
    }

    async fn decoding_key(
        &self,
        kid: Option<&str>,
        auth_base_url: &str,
    ) -> Result<DecodingKey, ApiError> {
        {
            let cached = self.cached.read().await;
            if cached.is_fresh() {
                if let Some(key) = cached.get(kid) {
                    return Ok(key);
                }
            }
        }

        // Cache miss or expired; refetch.
        let jwks = self.fetch(auth_base_url).await?;

        let mut cached = self.cached.write().await;
        cached.keys.clear();
        cached.default_key = None;
        cached.fetched_at = Some(Instant::now());

        for jwk in &jwks.keys {
            if let Some(key) = jwk_to_decoding_key(jwk) {
                if let Some(key_kid) = &jwk.kid {
                    cached.keys.insert(key_kid.clone(), key.clone());
                }
                if cached.default_key.is_none() {
                    cached.default_key = Some(key);
                }
            }
        }

        cached.get(kid).ok_or(ApiError::Unauthorized)
    }

    async fn fetch(&self, auth_base_url: &str) -> Result<Jwks, ApiError> {
        let jwks_url = format!("{auth_base_url}/.well-known/jwks.json");
        tracing::debug!(url = %jwks_url, "Fetching JWKS");

        let response = self.client.get(&jwks_url).send().await.map_err(|e| {
            tracing::error!(error = %e, url = %jwks_url, "Failed to fetch JWKS");
            ApiError::ExternalService("Failed to fetch authentication keys".into())
        })?;

        if !response.status().is_success() {
            tracing::error!(
                status = %response.status(),
                url = %jwks_url,
                "JWKS fetch returned non-success status"
            );
            return Err(ApiError::ExternalService(
                "Failed to fetch authentication keys".into(),
            ));
        }

        let jwks: Jwks = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse JWKS response");
            ApiError::ExternalService("Failed to parse authentication keys".into())
        })?;

        tracing::info!(keys_count = %jwks.keys.len(), "JWKS fetched");
        Ok(jwks)
    }
}

impl Default for JwksCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert an RSA JWK to a `DecodingKey`; other key types are skipped.
fn jwk_to_decoding_key(jwk: &Jwk) -> Option<DecodingKey> {
    if jwk.kty != "RSA" {
        tracing::debug!(kty = %jwk.kty, "Skipping non-RSA JWK");
        return None;
    }

    DecodingKey::from_rsa_components(jwk.n.as_ref()?, jwk.e.as_ref()?).ok()
}
