use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde_json::json;
use validator::Validate;

use crate::database::store::SessionTimer;
use crate::dto::admin_dto::ActiveTest;
use crate::dto::session_dto::{AnswerSubmit, CurrentQuestion, SessionInfo, SubmitAck};
use crate::error::Result;
use crate::middleware::auth::Claims;
use crate::models::user_response::NewResponse;
use crate::AppState;

#[axum::debug_handler]
pub async fn start_test(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
) -> Result<Json<SessionInfo>> {
    let user_id = claims.user_id()?;
    let info = state.session_service.start_session(test_id, user_id).await?;
    Ok(Json(info))
}

#[axum::debug_handler]
pub async fn current_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
) -> Result<Response> {
    state
        .session_service
        .ensure_owner(session_id, claims.user_id()?)
        .await?;

    match state.session_service.get_current_question(session_id).await? {
        CurrentQuestion::Question(question) => Ok(Json(question).into_response()),
        CurrentQuestion::JustCompleted => Ok(Json(json!({
            "detail": "Test Completed",
            "completed": true,
        }))
        .into_response()),
    }
}

#[axum::debug_handler]
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
    Json(payload): Json<AnswerSubmit>,
) -> Result<Json<SubmitAck>> {
    payload.validate()?;
    state
        .session_service
        .ensure_owner(session_id, claims.user_id()?)
        .await?;

    let ack = state
        .session_service
        .submit_answer(
            session_id,
            NewResponse {
                question_id: payload.question_id,
                status: payload.status,
                explanation: payload.explanation,
                critical_error: payload.critical_error,
            },
        )
        .await?;
    Ok(Json(ack))
}

#[axum::debug_handler]
pub async fn session_info(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
) -> Result<Json<SessionTimer>> {
    state
        .session_service
        .ensure_owner(session_id, claims.user_id()?)
        .await?;
    let timer = state.session_service.timer_info(session_id).await?;
    Ok(Json(timer))
}

#[axum::debug_handler]
pub async fn active_test(State(state): State<AppState>) -> Result<Json<Option<ActiveTest>>> {
    Ok(Json(state.test_service.active_test().await?))
}
