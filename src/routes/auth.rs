use axum::{extract::State, response::Json};
use validator::Validate;

use crate::dto::auth_dto::{LoginRequest, TokenResponse};
use crate::utils::token::issue_access_token;
use crate::AppState;

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> crate::error::Result<Json<TokenResponse>> {
    payload.validate()?;
    let user = state
        .user_service
        .authenticate(&payload.username, &payload.password)
        .await?;

    let access_token = issue_access_token(
        &state.auth.jwt_secret,
        user.id,
        user.is_admin,
        state.auth.jwt_ttl_hours,
    )?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        user_id: user.id,
        username: user.username,
        is_admin: user.is_admin,
    }))
}
