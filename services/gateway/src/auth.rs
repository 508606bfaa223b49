use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use types::ids::PlayerId;

/// Bearer token claims issued by the identity service
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: PlayerId,
    pub name: String,
    pub exp: usize,
}

#[derive(Debug, Clone)]
pub struct AuthenticatedPlayer {
    pub player_id: PlayerId,
    pub display_name: String,
}

/// Bearer header first; browsers cannot set headers on a WebSocket
/// handshake, so `?token=` is accepted too
fn token_from(parts: &Parts) -> Result<Option<&str>, AppError> {
    if let Some(header) = parts.headers.get("Authorization") {
        let value = header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid header string".into()))?;
        return match value.strip_prefix("Bearer ") {
            Some(token) => Ok(Some(token)),
            None => Err(AppError::Unauthorized("Expected a bearer token".into())),
        };
    }
    let query = parts.uri.query().unwrap_or_default();
    Ok(query.split('&').find_map(|pair| pair.strip_prefix("token=")))
}

pub fn verify(token: &str, secret: &str) -> Result<AuthenticatedPlayer, AppError> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(token, &key, &validation)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;
    Ok(AuthenticatedPlayer {
        player_id: data.claims.sub,
        display_name: data.claims.name,
    })
}

impl FromRequestParts<AppState> for AuthenticatedPlayer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from(parts)?
            .ok_or_else(|| AppError::Unauthorized("Missing authentication credentials".to_string()))?;
        verify(token, &state.config.jwt_secret)
    }
}

#[cfg(test)]
pub(crate) fn issue_token(secret: &str, player: PlayerId, name: &str) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};
    let claims = Claims {
        sub: player,
        name: name.to_string(),
        exp: 4_102_444_800,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}
