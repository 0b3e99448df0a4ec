//! JWT Authentication

use axum::http::{HeaderMap, StatusCode};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vibedoc_entitlements::SessionInfo;

const SECRET: &[u8] = b"vibedoc-api-secret-key-change-in-production";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid, // user_id
    pub email: String,
    pub exp: usize,
}

pub fn create_token(user_id: Uuid, email: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(8))
        .expect("valid timestamp")
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: expiration,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET))
}

pub fn verify_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(SECRET),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Session from a bearer token, when one is present and valid
pub fn session_from_headers(headers: &HeaderMap) -> Option<SessionInfo> {
    let value = headers.get("authorization")?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    let claims = verify_token(token).ok()?;
    Some(SessionInfo {
        user_id: claims.sub,
        email: claims.email,
    })
}

/// Session from a bearer token, 401 otherwise
pub fn require_session(headers: &HeaderMap) -> Result<SessionInfo, StatusCode> {
    session_from_headers(headers).ok_or(StatusCode::UNAUTHORIZED)
}
