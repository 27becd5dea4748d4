//! JWT authentication middleware for Axum

use super::models::{Claims, Role};
use crate::{error::WebError, state::AppState};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

/// Name of the session cookie set at login
pub const TOKEN_COOKIE: &str = "cyberrange_token";

/// Signing material and token lifetime, built once from configuration
#[derive(Clone)]
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
}

impl AuthKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: chrono::Duration::hours(ttl_hours),
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Generate JWT token from claims
    pub fn generate_token(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::default(), claims, &self.encoding)
    }

    /// Validate JWT token and extract claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &Validation::default()).map(|data| data.claims)
    }
}

/// Token from the session cookie, else from an `Authorization: Bearer` header
pub fn extract_token(jar: &CookieJar, request: &Request) -> Option<String> {
    if let Some(cookie) = jar.get(TOKEN_COOKIE) {
        return Some(cookie.value().to_string());
    }
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

/// Axum middleware to require authentication
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, WebError> {
    let token = extract_token(&jar, &request)
        .ok_or_else(|| WebError::Unauthorized("Not authenticated".to_string()))?;

    let claims = state
        .keys
        .validate_token(&token)
        .map_err(|_| WebError::Unauthorized("Invalid or expired token".to_string()))?;

    if claims.is_expired() {
        return Err(WebError::Unauthorized("Invalid or expired token".to_string()));
    }

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Axum middleware to require specific role; must run after [`require_auth`]
pub fn require_role(
    required_role: Role,
) -> impl Fn(
    Request,
    Next,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, WebError>> + Send>>
       + Clone {
    move |request: Request, next: Next| {
        let required = required_role;
        Box::pin(async move {
            let claims = request
                .extensions()
                .get::<Claims>()
                .ok_or_else(|| WebError::Unauthorized("Not authenticated".to_string()))?
                .clone();

            if !claims.get_role().has_permission(required) {
                tracing::warn!(
                    target: "audit",
                    user = %claims.sub,
                    role = %claims.role,
                    required = required.as_str(),
                    "refused role-restricted request"
                );
                return Err(WebError::Forbidden);
            }

            Ok(next.run(request).await)
        })
    }
}
