use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::UserId,
    routes::AppState,
    services::users,
};

/// Cookie carrying the access token when no Authorization header is sent
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// Claims expected in a bearer token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Authenticated user id
    pub sub: Uuid,
    /// Expiry as seconds since the epoch
    pub exp: usize,
}

/// Verifies HS256 bearer tokens
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Returns the subject of a valid, unexpired token
    pub fn verify(&self, token: &str) -> AppResult<UserId> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| UserId(data.claims.sub))
            .map_err(|e| {
                tracing::warn!(error = ?e, "Rejected bearer token");
                AppError::Unauthenticated
            })
    }
}

/// Pulls the raw token from the Authorization header, falling back to the cookie
fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .or_else(|| {
            CookieJar::from_headers(headers)
                .get(ACCESS_TOKEN_COOKIE)
                .map(|cookie| cookie.value().to_string())
        })
}

/// The authenticated caller of a request.
///
/// Handlers take this extractor and hand the id to the service layer
/// explicitly; there is no ambient current-user state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers).ok_or(AppError::Unauthenticated)?;
        let subject = state.jwt.verify(&token)?;
        let user = users::resolve(state.store.as_ref(), subject).await?;
        Ok(AuthUser(user.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn token(secret: &str, sub: Uuid, exp_offset: i64) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset) as usize;
        encode(
            &Header::new(Algorithm::HS256),
            &Claims { sub, exp },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_verify_valid_token() {
        let id = Uuid::new_v4();
        let verifier = JwtVerifier::new(SECRET);
        assert_eq!(verifier.verify(&token(SECRET, id, 3600)).unwrap(), UserId(id));
    }

    #[test]
    fn test_verify_rejects_wrong_secret_and_expired() {
        let verifier = JwtVerifier::new(SECRET);
        assert!(matches!(
            verifier.verify(&token("other", Uuid::new_v4(), 3600)),
            Err(AppError::Unauthenticated)
        ));
        assert!(matches!(
            verifier.verify(&token(SECRET, Uuid::new_v4(), -3600)),
            Err(AppError::Unauthenticated)
        ));
        assert!(matches!(
            verifier.verify("not-a-jwt"),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn test_token_prefers_header_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert("cookie", HeaderValue::from_static("accessToken=from-cookie"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("theme=dark; accessToken=abc"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc"));

        assert_eq!(token_from_headers(&HeaderMap::new()), None);
    }
}
