use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::error::{Error, Result};
use crate::middleware::auth::Claims;

pub const ADMIN_ROLE: &str = "admin";
pub const USER_ROLE: &str = "user";

/// HS256 bearer token for `user_id`, valid for `ttl_hours`.
pub fn issue_access_token(secret: &str, user_id: i64, is_admin: bool, ttl_hours: i64) -> Result<String> {
    let exp = chrono::Utc::now() + chrono::Duration::hours(ttl_hours.max(1));
    let claims = Claims {
        sub: user_id.to_string(),
        exp: exp.timestamp() as usize,
        role: Some(if is_admin { ADMIN_ROLE } else { USER_ROLE }.to_string()),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("Failed to sign token: {e}")))
}

pub fn decode_access_token(secret: &str, token: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|_| Error::Unauthorized("invalid_token".to_string()))
}
