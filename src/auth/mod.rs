//! Bearer token verification against a remote JWKS and per-page permission
//! checks against a relation-tuple read API.

use jsonwebtoken::{decode, decode_header, jwk::JwkSet, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::AuthConfig;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Claims read from a verified access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Authenticated caller, inserted into request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub sub: String,
    pub email: Option<String>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            sub: claims.sub,
            email: claims.email,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("JWKS request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No signing key matches kid {0:?}")]
    UnknownKey(Option<String>),
}

/// Verifies tokens with keys from a JWKS endpoint.
///
/// The key set is fetched on first use and cached. A token whose `kid` is
/// not in the cached set triggers one refetch, which picks up rotated keys.
pub struct TokenVerifier {
    client: reqwest::Client,
    jwks_url: String,
    issuer: String,
    audience: Option<String>,
    keys: RwLock<Option<JwkSet>>,
}

impl TokenVerifier {
    pub fn new(client: reqwest::Client, jwks_url: &str, issuer: &str, audience: Option<&str>) -> Self {
        Self {
            client,
            jwks_url: jwks_url.to_string(),
            issuer: issuer.to_string(),
            audience: audience.map(str::to_string),
            keys: RwLock::new(None),
        }
    }

    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token)?;
        let key = self.decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[&self.issuer]);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(decode::<Claims>(token, &key, &validation)?.claims)
    }

    async fn decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey, AuthError> {
        if let Some(set) = self.keys.read().await.as_ref() {
            if let Some(key) = select_key(set, kid)? {
                return Ok(key);
            }
        }

        let set = self.fetch().await?;
        let key = select_key(&set, kid)?;
        *self.keys.write().await = Some(set);
        key.ok_or_else(|| AuthError::UnknownKey(kid.map(str::to_string)))
    }

    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        debug!("Fetching JWKS from {}", self.jwks_url);
        let set = self
            .client
            .get(&self.jwks_url)
            .send()
            .await?
            .error_for_status()?
            .json::<JwkSet>()
            .await?;
        info!("Loaded {} signing keys", set.keys.len());
        Ok(set)
    }
}

/// Key for `kid`, or the only key of the set when the token names none
fn select_key(set: &JwkSet, kid: Option<&str>) -> Result<Option<DecodingKey>, AuthError> {
    let jwk = match kid {
        Some(kid) => set.find(kid),
        None if set.keys.len() == 1 => set.keys.first(),
        None => None,
    };
    Ok(jwk.map(DecodingKey::from_jwk).transpose()?)
}

/// Client for the relation-tuple check endpoint
pub struct PermissionChecker {
    client: reqwest::Client,
    read_url: String,
}

/// One relation check: does `subject_id` have `relation` on `namespace:object`
#[derive(Debug, Serialize)]
pub struct RelationCheck<'a> {
    pub namespace: &'a str,
    pub object: &'a str,
    pub relation: &'a str,
    pub subject_id: &'a str,
}

#[derive(Deserialize)]
struct CheckResponse {
    #[serde(default)]
    allowed: bool,
}

impl PermissionChecker {
    pub fn new(client: reqwest::Client, read_url: &str) -> Self {
        Self {
            client,
            read_url: read_url.trim_end_matches('/').to_string(),
        }
    }

    /// True only when the service answers 200 with `allowed: true`
    pub async fn check(&self, check: &RelationCheck<'_>) -> bool {
        let url = format!("{}/relation-tuples/check", self.read_url);
        let response = match self.client.get(&url).query(check).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Permission check failed: {}", e);
                return false;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            debug!("Permission check returned {}", response.status());
            return false;
        }

        match response.json::<CheckResponse>().await {
            Ok(body) => body.allowed,
            Err(e) => {
                warn!("Permission check returned an unreadable body: {}", e);
                false
            }
        }
    }

    pub async fn can_access_page(&self, page: &str, subject: &str) -> bool {
        self.check(&RelationCheck {
            namespace: "pages",
            object: page,
            relation: "access",
            subject_id: subject,
        })
        .await
    }
}

/// Token verification plus permission checks, shared by the middleware
pub struct Authenticator {
    pub verifier: TokenVerifier,
    pub permissions: PermissionChecker,
}

impl Authenticator {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            verifier: TokenVerifier::new(
                client.clone(),
                &config.jwks_url,
                &config.issuer,
                config.audience.as_deref(),
            ),
            permissions: PermissionChecker::new(client, &config.keto_read_url),
        })
    }

    /// `None` when authentication is switched off
    pub fn from_config(config: &AuthConfig) -> Result<Option<Arc<Self>>, AuthError> {
        if !config.enabled {
            info!("Authentication disabled");
            return Ok(None);
        }
        info!("Authentication enabled (issuer {})", config.issuer);
        Ok(Some(Arc::new(Self::new(config)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRET: &str = "c2VjcmV0c2VjcmV0c2VjcmV0c2VjcmV0";
    const ISSUER: &str = "https://issuer.test";

    fn token(kid: Option<&str>, claims: serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = kid.map(str::to_string);
        encode(&header, &claims, &EncodingKey::from_base64_secret(SECRET).unwrap()).unwrap()
    }

    fn claims(sub: &str) -> serde_json::Value {
        json!({
            "sub": sub,
            "email": "user@example.com",
            "iss": ISSUER,
            "exp": chrono::Utc::now().timestamp() + 600
        })
    }

    fn jwks(kid: &str) -> serde_json::Value {
        json!({ "keys": [{ "kty": "oct", "kid": kid, "k": SECRET }] })
    }

    async fn jwks_server(kid: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks(kid)))
            .mount(&server)
            .await;
        server
    }

    fn verifier(server: &MockServer, audience: Option<&str>) -> TokenVerifier {
        TokenVerifier::new(
            reqwest::Client::new(),
            &format!("{}/jwks.json", server.uri()),
            ISSUER,
            audience,
        )
    }

    #[tokio::test]
    async fn verifies_token_signed_with_published_key() {
        let server = jwks_server("k1").await;
        let claims = verifier(&server, None)
            .verify(&token(Some("k1"), claims("user-1")))
            .await
            .unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email.as_deref(), Some("user@example.com"));
    }

    #[tokio::test]
    async fn caches_key_set_between_calls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks("k1")))
            .expect(1)
            .mount(&server)
            .await;

        let verifier = verifier(&server, None);
        for _ in 0..3 {
            verifier.verify(&token(Some("k1"), claims("user-1"))).await.unwrap();
        }
    }

    #[tokio::test]
    async fn rejects_wrong_issuer() {
        let server = jwks_server("k1").await;
        let mut bad = claims("user-1");
        bad["iss"] = json!("https://elsewhere.test");
        assert!(verifier(&server, None).verify(&token(Some("k1"), bad)).await.is_err());
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let server = jwks_server("k1").await;
        let mut expired = claims("user-1");
        expired["exp"] = json!(chrono::Utc::now().timestamp() - 3600);
        assert!(verifier(&server, None).verify(&token(Some("k1"), expired)).await.is_err());
    }

    #[tokio::test]
    async fn audience_checked_only_when_configured() {
        let server = jwks_server("k1").await;
        let mut with_aud = claims("user-1");
        with_aud["aud"] = json!("editor");

        assert!(verifier(&server, None).verify(&token(Some("k1"), with_aud.clone())).await.is_ok());
        assert!(verifier(&server, Some("editor"))
            .verify(&token(Some("k1"), with_aud.clone()))
            .await
            .is_ok());
        assert!(verifier(&server, Some("viewer"))
            .verify(&token(Some("k1"), with_aud))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn unknown_kid_is_rejected() {
        let server = jwks_server("k1").await;
        let err = verifier(&server, None)
            .verify(&token(Some("other"), claims("user-1")))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnknownKey(Some(ref kid)) if kid == "other"));
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let server = jwks_server("k1").await;
        assert!(verifier(&server, None).verify("not-a-jwt").await.is_err());
    }

    #[tokio::test]
    async fn permission_allowed_only_on_explicit_true() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/relation-tuples/check"))
            .and(query_param("namespace", "pages"))
            .and(query_param("object", "home"))
            .and(query_param("relation", "access"))
            .and(query_param("subject_id", "user-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "allowed": true })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/relation-tuples/check"))
            .and(query_param("object", "secret"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "allowed": false })))
            .mount(&server)
            .await;

        let checker = PermissionChecker::new(reqwest::Client::new(), &server.uri());
        assert!(checker.can_access_page("home", "user-1").await);
        assert!(!checker.can_access_page("home", "user-2").await);
        assert!(!checker.can_access_page("secret", "user-1").await);
    }

    #[tokio::test]
    async fn unreachable_permission_service_denies() {
        let checker = PermissionChecker::new(reqwest::Client::new(), "http://127.0.0.1:1");
        assert!(!checker.can_access_page("home", "user-1").await);
    }

    #[test]
    fn disabled_config_builds_nothing() {
        let config = AuthConfig {
            enabled: false,
            jwks_url: "http://localhost/jwks.json".to_string(),
            issuer: ISSUER.to_string(),
            audience: None,
            keto_read_url: "http://localhost:4466".to_string(),
        };
        assert!(Authenticator::from_config(&config).unwrap().is_none());
    }
}
