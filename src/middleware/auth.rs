use crate::common::response::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by externally-issued access tokens. Token issuance lives in
/// the auth service; this API only verifies the signature and expiry.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    pub sub: Uuid,
    pub exp: usize,
}

pub fn verify_token(secret: &str, token: &str) -> Result<TokenClaims, jsonwebtoken::errors::Error> {
    Ok(decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?
    .claims)
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_value| auth_value.strip_prefix("Bearer ").map(str::to_owned));

    let token = match token {
        Some(t) => t,
        None => {
            return Err(ApiError(
                "Unauthorized: Missing or invalid token".to_string(),
                StatusCode::UNAUTHORIZED,
            ));
        }
    };

    let claims = verify_token(&state.config.jwt_secret, &token).map_err(|_| {
        ApiError(
            "Unauthorized: Invalid token signature".to_string(),
            StatusCode::UNAUTHORIZED,
        )
    })?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
