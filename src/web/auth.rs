use crate::components::google_calendar::Credential;
use axum::body::Body;
use axum::extract::State;
use axum::http::request::Parts;
use axum::http::{header, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

use super::AppState;

/// Name of the cookie carrying the session token
pub const AUTH_COOKIE: &str = "auth_token";

/// Claims of the session token issued after sign-in
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Calendar provider access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Expiration time (as UTC timestamp)
    pub exp: usize,
    /// Issued at (as UTC timestamp)
    pub iat: usize,
}

/// The authenticated caller, placed in request extensions by `require_auth`
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: Claims,
}

impl AuthUser {
    pub fn user_id(&self) -> &str {
        &self.claims.sub
    }

    /// Provider credential of the caller, if the sign-in granted one
    pub fn credential(&self) -> Option<Credential> {
        self.claims
            .access_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .map(|token| Credential::new(token).for_user(&self.claims.sub))
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    /// Signed in, but without a calendar credential
    NotAuthenticated,
    Other(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingToken => "Missing session token",
            AuthError::InvalidToken => "Invalid session token",
            AuthError::NotAuthenticated => "Not authenticated",
            AuthError::Other(err) => {
                error!("Auth error: {}", err);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response();
            }
        };
        (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
    }
}

/// Find the session token in the `auth_token` cookie or the bearer header
pub fn extract_token(parts: &Parts) -> Result<String, AuthError> {
    if let Some(cookie) = parts.headers.get(header::COOKIE) {
        let cookie_str = cookie.to_str().map_err(|_| AuthError::InvalidToken)?;
        let token = cookie_str.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == AUTH_COOKIE && !value.is_empty()).then(|| value.to_string())
        });
        if let Some(token) = token {
            return Ok(token);
        }
    }

    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?;
    let auth_str = auth_header.to_str().map_err(|_| AuthError::InvalidToken)?;

    auth_str
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidToken)
}

/// Issues and verifies HS256 session tokens
pub struct AuthService {
    jwt_secret: String,
    token_expiration_minutes: i64,
}

impl AuthService {
    pub fn new(jwt_secret: &str) -> Self {
        Self {
            jwt_secret: jwt_secret.to_string(),
            token_expiration_minutes: 60 * 24 * 7,
        }
    }

    /// Issue a token for a signed-in user, optionally carrying the provider
    /// access token obtained during sign-in
    pub fn generate_token(
        &self,
        user_id: &str,
        email: Option<&str>,
        access_token: Option<&str>,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.token_expiration_minutes);

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.map(str::to_string),
            access_token: access_token.map(str::to_string),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::Other(format!("Failed to generate token: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|token_data| token_data.claims)
        .map_err(|e| {
            debug!("JWT validation error: {:?}", e);
            AuthError::InvalidToken
        })
    }
}

/// Middleware rejecting requests without a valid session token
pub async fn require_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let (parts, body) = req.into_parts();
    let token = extract_token(&parts)?;
    let claims = state.auth.validate_token(&token)?;

    let mut req = Request::from_parts(parts, body);
    req.extensions_mut().insert(AuthUser { claims });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts_with(name: header::HeaderName, value: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header(name, value)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn token_round_trip_keeps_credential() {
        let auth = AuthService::new("test-secret");
        let token = auth
            .generate_token("user-1", Some("user@example.com"), Some("ya29.token"))
            .unwrap();

        let claims = auth.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email.as_deref(), Some("user@example.com"));

        let user = AuthUser { claims };
        let credential = user.credential().unwrap();
        assert_eq!(credential.access_token, "ya29.token");
        assert_eq!(credential.user_id.as_deref(), Some("user-1"));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = AuthService::new("one")
            .generate_token("user-1", None, None)
            .unwrap();
        assert!(matches!(
            AuthService::new("two").validate_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn reads_cookie_before_header() {
        let parts = parts_with(header::COOKIE, "theme=dark; auth_token=abc.def");
        assert_eq!(extract_token(&parts).unwrap(), "abc.def");
    }

    #[test]
    fn reads_bearer_header() {
        let parts = parts_with(header::AUTHORIZATION, "Bearer abc.def");
        assert_eq!(extract_token(&parts).unwrap(), "abc.def");

        let parts = parts_with(header::AUTHORIZATION, "Basic Zm9v");
        assert!(matches!(extract_token(&parts), Err(AuthError::InvalidToken)));
    }
}
