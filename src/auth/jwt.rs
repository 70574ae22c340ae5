//! Session tokens and the `AuthUser` extractor that guards every user-scoped route.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind as JwtErrorKind, DecodingKey, EncodingKey, Header,
    Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{config::JwtConfig, error::AppError, state::AppState};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Payload carried by both session tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub kind: TokenKind,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("expected a {expected:?} token, got {found:?}")]
    WrongKind { expected: TokenKind, found: TokenKind },
    #[error("token rejected: {0}")]
    Invalid(jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            JwtErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(err),
        }
    }
}

/// Signing material plus the validation rules for this deployment's tokens.
#[derive(Clone)]
pub struct JwtKeys {
    signing: EncodingKey,
    verifying: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        let mut validation = Validation::default();
        validation.set_issuer(&[cfg.issuer.as_str()]);
        validation.set_audience(&[cfg.audience.as_str()]);
        Self {
            signing: EncodingKey::from_secret(cfg.secret.as_bytes()),
            verifying: DecodingKey::from_secret(cfg.secret.as_bytes()),
            validation,
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::minutes(cfg.ttl_minutes.max(0)),
            refresh_ttl: Duration::minutes(cfg.refresh_ttl_minutes.max(0)),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from(&state.config.jwt)
    }
}

impl JwtKeys {
    fn claims(&self, user: Uuid, kind: TokenKind, issued: OffsetDateTime) -> Claims {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        Claims {
            sub: user,
            kind,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: issued.unix_timestamp(),
            exp: (issued + ttl).unix_timestamp(),
        }
    }

    pub fn issue(&self, user: Uuid, kind: TokenKind) -> anyhow::Result<String> {
        let claims = self.claims(user, kind, OffsetDateTime::now_utc());
        let token = encode(&Header::default(), &claims, &self.signing)?;
        debug!(%user, ?kind, "token issued");
        Ok(token)
    }

    /// Verifies signature, issuer, audience and expiry, then checks the token kind.
    pub fn decode_as(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.verifying, &self.validation)?.claims;
        if claims.kind != expected {
            return Err(TokenError::WrongKind {
                expected,
                found: claims.kind,
            });
        }
        Ok(claims)
    }
}

/// The authenticated user behind a request, resolved from its bearer access token.
pub struct AuthUser(pub Uuid);

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let value = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Unauthorized".into()))?;
    value
        .split_once(' ')
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let keys = JwtKeys::from_ref(state);
        match keys.decode_as(token, TokenKind::Access) {
            Ok(claims) => Ok(AuthUser(claims.sub)),
            Err(e @ TokenError::WrongKind { .. }) => {
                warn!(error = %e, "session rejected");
                Err(AppError::Unauthorized("Access token required".into()))
            }
            Err(e) => {
                warn!(error = %e, "session rejected");
                Err(AppError::Unauthorized("Invalid or expired token".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Request, StatusCode};

    use super::*;

    fn keys(secret: &str) -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: secret.into(),
            issuer: "whiskin".into(),
            audience: "whiskin-app".into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        })
    }

    async fn resolve(keys: &JwtKeys, authorization: Option<&str>) -> Result<Uuid, AppError> {
        let mut req = Request::builder().uri("/api/me");
        if let Some(value) = authorization {
            req = req.header(AUTHORIZATION, value);
        }
        let (mut parts, _) = req.body(()).unwrap().into_parts();
        AuthUser::from_request_parts(&mut parts, keys)
            .await
            .map(|AuthUser(id)| id)
    }

    fn unauthorized(result: Result<Uuid, AppError>) -> String {
        let err = result.err().expect("request should be rejected");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        err.to_string()
    }

    #[tokio::test]
    async fn access_token_resolves_user_with_any_scheme_case() {
        let keys = keys("s3cret");
        let user = Uuid::new_v4();
        let token = keys.issue(user, TokenKind::Access).unwrap();

        assert_eq!(resolve(&keys, Some(&format!("Bearer {token}"))).await.unwrap(), user);
        assert_eq!(resolve(&keys, Some(&format!("bearer {token}"))).await.unwrap(), user);
    }

    #[tokio::test]
    async fn missing_or_non_bearer_header_is_rejected() {
        let keys = keys("s3cret");
        assert_eq!(unauthorized(resolve(&keys, None).await), "Unauthorized");
        assert_eq!(
            unauthorized(resolve(&keys, Some("Basic dXNlcjpwdw==")).await),
            "Invalid Authorization header"
        );
        assert_eq!(
            unauthorized(resolve(&keys, Some("Bearer ")).await),
            "Invalid Authorization header"
        );
    }

    #[tokio::test]
    async fn refresh_token_cannot_open_a_session() {
        let keys = keys("s3cret");
        let refresh = keys.issue(Uuid::new_v4(), TokenKind::Refresh).unwrap();
        assert_eq!(
            unauthorized(resolve(&keys, Some(&format!("Bearer {refresh}"))).await),
            "Access token required"
        );
        assert!(keys.decode_as(&refresh, TokenKind::Refresh).is_ok());
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let keys = keys("s3cret");
        let issued = OffsetDateTime::now_utc() - Duration::hours(2);
        let claims = keys.claims(Uuid::new_v4(), TokenKind::Access, issued);
        let token = encode(&Header::default(), &claims, &keys.signing).unwrap();

        assert!(matches!(
            keys.decode_as(&token, TokenKind::Access),
            Err(TokenError::Expired)
        ));
        assert_eq!(
            unauthorized(resolve(&keys, Some(&format!("Bearer {token}"))).await),
            "Invalid or expired token"
        );
    }

    #[tokio::test]
    async fn foreign_signature_is_rejected() {
        let token = keys("other").issue(Uuid::new_v4(), TokenKind::Access).unwrap();
        let result = resolve(&keys("s3cret"), Some(&format!("Bearer {token}"))).await;
        assert_eq!(unauthorized(result), "Invalid or expired token");
    }
}
