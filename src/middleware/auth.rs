use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::token::{decode_access_token, ADMIN_ROLE};
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64> {
        self.sub
            .parse()
            .map_err(|_| Error::Unauthorized("invalid_token".to_string()))
    }

    pub fn is_admin(&self) -> bool {
        self.role
            .as_deref()
            .map(|r| r.eq_ignore_ascii_case(ADMIN_ROLE))
            .unwrap_or(false)
    }
}

fn bearer_claims(req: &Request, secret: &str) -> Result<Claims> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| Error::Unauthorized("missing_authorization".to_string()))?;
    let auth_str = auth_header
        .to_str()
        .map_err(|_| Error::Unauthorized("bad_authorization".to_string()))?;
    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| Error::Unauthorized("unsupported_scheme".to_string()))?;
    decode_access_token(secret, token)
}

pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    match bearer_claims(&req, &state.auth.jwt_secret) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

pub async fn require_admin(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    match bearer_claims(&req, &state.auth.jwt_secret) {
        Ok(claims) if claims.is_admin() => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Ok(claims) => {
            tracing::warn!(sub = %claims.sub, "non-admin token on admin route");
            Error::Forbidden("forbidden".to_string()).into_response()
        }
        Err(e) => e.into_response(),
    }
}
