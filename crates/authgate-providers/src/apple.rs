//! Sign in with Apple.
//!
//! Only the mobile branch is supported: the app obtains an identity token
//! on device and the gateway verifies it against Apple's published keys.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::http;
use crate::traits::{AuthorizationRequest, OAuthProvider, ProviderError};
use authgate_core::config::AppleConfig;
use authgate_core::secrets::SecretString;
use authgate_core::{ExternalIdentity, ProviderKind};

const JWKS_URL: &str = "https://appleid.apple.com/auth/keys";
const ISSUER: &str = "https://appleid.apple.com";
const JWKS_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
/// Minimum age of the cached key set before an unknown `kid` forces a refetch.
const JWKS_REFRESH_COOLDOWN: Duration = Duration::from_secs(60);

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Sign in with Apple provider.
pub struct AppleProvider {
    client: Client,
    jwks_url: String,
    audience: String,
    refresh_cooldown: Duration,
    cache: Arc<RwLock<Option<CachedKeys>>>,
}

impl AppleProvider {
    /// Create a new Apple provider.
    #[must_use]
    pub fn new(config: &AppleConfig) -> Self {
        Self {
            client: http::client(),
            jwks_url: config
                .jwks_url
                .clone()
                .unwrap_or_else(|| JWKS_URL.to_string()),
            audience: config.audience.clone(),
            refresh_cooldown: JWKS_REFRESH_COOLDOWN,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Key set, served from cache while fresh.
    ///
    /// With `refresh`, a cached set older than the cooldown is refetched so
    /// rotated keys are picked up without waiting for the cache to expire.
    async fn keys(&self, refresh: bool) -> Result<JwkSet, ProviderError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.as_ref() {
                let age = entry.fetched_at.elapsed();
                let stale = age >= JWKS_CACHE_TTL || (refresh && age >= self.refresh_cooldown);
                if !stale {
                    return Ok(entry.keys.clone());
                }
            }
        }

        let response = self.client.get(&self.jwks_url).send().await?;
        let keys: JwkSet = http::json(response).await?;

        *self.cache.write().await = Some(CachedKeys {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });
        Ok(keys)
    }

    async fn decoding_key(&self, kid: &str) -> Result<(DecodingKey, Algorithm), ProviderError> {
        let keys = self.keys(false).await?;
        if let Some(jwk) = keys.find(kid) {
            return jwk_to_decoding_key(jwk);
        }

        debug!(kid, "signing key not cached, refreshing Apple keys");
        let keys = self.keys(true).await?;
        let jwk = keys
            .find(kid)
            .ok_or_else(|| ProviderError::Token(format!("no signing key with kid {kid}")))?;
        jwk_to_decoding_key(jwk)
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[&self.audience]);
        validation
    }
}

fn jwk_to_decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Algorithm), ProviderError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|e| ProviderError::Token(format!("bad RSA key: {e}")))?;
            Ok((key, Algorithm::RS256))
        }
        _ => Err(ProviderError::Token(
            "unsupported key type in Apple JWKS".to_string(),
        )),
    }
}

/// Claims of an Apple identity token that matter here.
#[derive(Debug, Deserialize)]
struct AppleClaims {
    sub: Option<String>,
    email: Option<String>,
    #[serde(default)]
    is_private_email: Option<serde_json::Value>,
}

impl AppleClaims {
    /// Private relay addresses are dropped, never used as principals.
    fn into_identity(self) -> Result<ExternalIdentity, ProviderError> {
        let sub = self
            .sub
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("apple token has no sub".to_string()))?;

        let private = match self.is_private_email {
            Some(serde_json::Value::Bool(b)) => b,
            Some(serde_json::Value::String(s)) => s == "true",
            _ => false,
        };

        let mut identity = ExternalIdentity::new(ProviderKind::Apple).with_id(sub);
        if !private {
            identity.email = self.email;
        }
        Ok(identity)
    }
}

#[async_trait]
impl OAuthProvider for AppleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Apple
    }

    fn describe_authorization_request(&self, redirect_uri: &str) -> AuthorizationRequest {
        AuthorizationRequest {
            name: "Apple".to_string(),
            base_url: format!("{ISSUER}/auth/authorize"),
            client_id: self.audience.clone(),
            scope: "name email".to_string(),
            response_type: "code".to_string(),
            redirect_uri: redirect_uri.to_string(),
        }
    }

    async fn exchange_code(
        &self,
        _code: &str,
        _redirect_uri: &str,
    ) -> Result<SecretString, ProviderError> {
        Err(ProviderError::Unsupported(ProviderKind::Apple))
    }

    async fn fetch_identity(&self, token: &str) -> Result<ExternalIdentity, ProviderError> {
        let header = decode_header(token).map_err(|e| ProviderError::Token(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| ProviderError::Token("identity token has no kid".to_string()))?;

        let (key, algorithm) = self.decoding_key(&kid).await?;
        let data = decode::<AppleClaims>(token, &key, &self.validation(algorithm))
            .map_err(|e| ProviderError::Token(e.to_string()))?;

        data.claims.into_identity()
    }

    fn supports_web_login(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use axum::{Json, Router, routing::get};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use std::sync::atomic::{AtomicUsize, Ordering};

    // Header {"alg":"RS256","kid":"K1"}, payload {"sub":"x"}, fake signature.
    const TOKEN_WITH_KID: &str = "eyJhbGciOiJSUzI1NiIsImtpZCI6IksxIn0.eyJzdWIiOiJ4In0.c2ln";

    const TEST_KEY_PEM: &str = include_str!("../testdata/apple_rsa.pem");
    const TEST_KEY_MODULUS: &str = include_str!("../testdata/apple_rsa.n");

    fn jwk(kid: &str) -> serde_json::Value {
        serde_json::json!({
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "kid": kid,
            "n": TEST_KEY_MODULUS.trim(),
            "e": "AQAB",
        })
    }

    fn claims(audience: &str, issuer: &str) -> serde_json::Value {
        serde_json::json!({
            "iss": issuer,
            "aud": audience,
            "sub": "001.abc",
            "email": "eve@example.com",
            "iat": chrono::Utc::now().timestamp(),
            "exp": chrono::Utc::now().timestamp() + 600,
        })
    }

    fn sign(kid: &str, claims: &serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        let key = EncodingKey::from_rsa_pem(TEST_KEY_PEM.as_bytes()).unwrap();
        encode(&header, claims, &key).unwrap()
    }

    /// Serve successive key sets (the last one repeats) and count fetches.
    async fn provider_with_keys(sets: Vec<Vec<&'static str>>) -> (AppleProvider, Arc<AtomicUsize>) {
        let fetches = Arc::new(AtomicUsize::new(0));
        let counter = fetches.clone();
        let router = Router::new().route(
            "/auth/keys",
            get(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let kids = &sets[n.min(sets.len() - 1)];
                let keys: Vec<_> = kids.iter().map(|kid| jwk(kid)).collect();
                async move { Json(serde_json::json!({ "keys": keys })) }
            }),
        );
        let base = testing::serve(router).await;
        let provider = AppleProvider::new(&AppleConfig {
            audience: "com.example.app".to_string(),
            jwks_url: Some(format!("{base}/auth/keys")),
        });
        (provider, fetches)
    }

    #[test]
    fn test_private_email_removed() {
        let claims: AppleClaims = serde_json::from_str(
            r#"{"sub":"001.abc","email":"x@privaterelay.appleid.com","is_private_email":"true"}"#,
        )
        .unwrap();
        let identity = claims.into_identity().unwrap();
        assert_eq!(identity.id.as_deref(), Some("001.abc"));
        assert_eq!(identity.email, None);
    }

    #[test]
    fn test_public_email_kept() {
        let claims: AppleClaims = serde_json::from_str(
            r#"{"sub":"001.abc","email":"eve@example.com","is_private_email":false}"#,
        )
        .unwrap();
        let identity = claims.into_identity().unwrap();
        assert_eq!(identity.email.as_deref(), Some("eve@example.com"));
    }

    #[test]
    fn test_claims_without_sub_rejected() {
        let claims: AppleClaims = serde_json::from_str(r#"{"email":"a@b.c"}"#).unwrap();
        assert!(claims.into_identity().is_err());
    }

    #[tokio::test]
    async fn test_web_login_not_supported() {
        let provider = AppleProvider::new(&AppleConfig::default());
        assert!(!provider.supports_web_login());
        assert!(matches!(
            provider.exchange_code("c", "r").await,
            Err(ProviderError::Unsupported(ProviderKind::Apple))
        ));
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let provider = AppleProvider::new(&AppleConfig::default());
        assert!(matches!(
            provider.fetch_identity("not-a-jwt").await,
            Err(ProviderError::Token(_))
        ));
    }

    #[tokio::test]
    async fn test_verifies_signed_identity_token() {
        let (provider, fetches) = provider_with_keys(vec![vec!["K1"]]).await;

        let token = sign("K1", &claims("com.example.app", ISSUER));
        let identity = provider.fetch_identity(&token).await.unwrap();
        assert_eq!(identity.kind, ProviderKind::Apple);
        assert_eq!(identity.id.as_deref(), Some("001.abc"));
        assert_eq!(identity.email.as_deref(), Some("eve@example.com"));

        provider.fetch_identity(&token).await.unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_token_for_other_app_rejected() {
        let (provider, _) = provider_with_keys(vec![vec!["K1"]]).await;

        let token = sign("K1", &claims("com.other.app", ISSUER));
        assert!(matches!(
            provider.fetch_identity(&token).await,
            Err(ProviderError::Token(_))
        ));
    }

    #[tokio::test]
    async fn test_token_from_other_issuer_rejected() {
        let (provider, _) = provider_with_keys(vec![vec!["K1"]]).await;

        let token = sign("K1", &claims("com.example.app", "https://evil.example"));
        assert!(matches!(
            provider.fetch_identity(&token).await,
            Err(ProviderError::Token(_))
        ));
    }

    #[tokio::test]
    async fn test_rotated_key_refetched() {
        let (mut provider, fetches) = provider_with_keys(vec![vec!["K1"], vec!["K1", "K2"]]).await;
        provider.refresh_cooldown = Duration::ZERO;

        provider
            .fetch_identity(&sign("K1", &claims("com.example.app", ISSUER)))
            .await
            .unwrap();
        let identity = provider
            .fetch_identity(&sign("K2", &claims("com.example.app", ISSUER)))
            .await
            .unwrap();
        assert_eq!(identity.id.as_deref(), Some("001.abc"));
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_kid_rejected() {
        let (provider, fetches) = provider_with_keys(vec![vec![]]).await;

        let err = provider.fetch_identity(TOKEN_WITH_KID).await.unwrap_err();
        assert!(err.to_string().contains("K1"));

        // Keys were fetched moments ago, so the miss does not refetch.
        provider.fetch_identity(TOKEN_WITH_KID).await.unwrap_err();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }
}
