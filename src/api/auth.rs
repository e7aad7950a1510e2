//! Request authentication.
//!
//! Every protected route needs the shared API token. The acting user comes
//! from identity headers set by the upstream session layer, which is only
//! trusted because the caller already holds the token.

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, Query, State},
    http::{request::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

use super::error::AppError;
use super::state::AppState;
use crate::lifecycle::{Actor, Role};

pub const AUTH_HEADER: &str = "X-Pdm-Token";
pub const ACTOR_EMAIL_HEADER: &str = "X-Pdm-Actor-Email";
pub const ACTOR_ROLE_HEADER: &str = "X-Pdm-Actor-Role";
pub const ACTOR_NAME_HEADER: &str = "X-Pdm-Actor-Name";

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request
        .headers()
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .or(query.token);

    match token {
        Some(t) if t == state.api_token => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!(
                "Invalid API token for {} {}",
                request.method(),
                request.uri().path()
            );
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!(
                "Missing API token for {} {}",
                request.method(),
                request.uri().path()
            );
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, AppError> {
    let email = header_value(headers, ACTOR_EMAIL_HEADER)
        .ok_or_else(|| AppError::unauthorized(format!("Missing {} header", ACTOR_EMAIL_HEADER)))?;
    let role_str = header_value(headers, ACTOR_ROLE_HEADER)
        .ok_or_else(|| AppError::unauthorized(format!("Missing {} header", ACTOR_ROLE_HEADER)))?;
    let role = Role::parse(role_str)
        .ok_or_else(|| AppError::bad_request(format!("Unknown role: {}", role_str)))?;

    Ok(Actor {
        email: email.to_string(),
        name: header_value(headers, ACTOR_NAME_HEADER).map(String::from),
        role,
    })
}

/// Extractor for the user on whose behalf the request is made.
pub struct ActingUser(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers).map(ActingUser)
    }
}

pub fn generate_token() -> String {
    use rand::Rng;

    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    const TOKEN_LENGTH: usize = 32;

    let mut rng = rand::thread_rng();
    (0..TOKEN_LENGTH)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_generate_token() {
        let token1 = generate_token();
        let token2 = generate_token();

        assert_eq!(token1.len(), 32);
        assert_eq!(token2.len(), 32);
        assert_ne!(token1, token2);
        assert!(token1.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn actor_parsed_from_headers() {
        let actor = actor_from_headers(&headers(&[
            ("x-pdm-actor-email", "ops@example.com"),
            ("x-pdm-actor-role", "PM_OPS"),
            ("x-pdm-actor-name", "Dana Ops"),
        ]))
        .unwrap();

        assert_eq!(actor.email, "ops@example.com");
        assert_eq!(actor.role, Role::PmOps);
        assert_eq!(actor.name.as_deref(), Some("Dana Ops"));
    }

    #[test]
    fn missing_identity_is_unauthorized() {
        let err = actor_from_headers(&headers(&[("x-pdm-actor-role", "ADMIN")])).err().unwrap();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let err = actor_from_headers(&headers(&[("x-pdm-actor-email", "a@example.com")])).err().unwrap();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn unknown_role_is_bad_request() {
        let err = actor_from_headers(&headers(&[
            ("x-pdm-actor-email", "a@example.com"),
            ("x-pdm-actor-role", "INTERN"),
        ]))
        .err()
        .unwrap();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
