use axum::{
    extract::{Path, State},
    response::Json,
};
use validator::Validate;

use crate::dto::admin_dto::{
    ActiveTest, AddQuestionPayload, AdminCheck, CreateTestPayload, CreatedTest, MessageResponse,
    QuestionAdded, SessionResult, UserOverview, UserReport,
};
use crate::error::Result;
use crate::models::question::QuestionSummary;
use crate::models::test::TestWithCount;
use crate::AppState;

#[axum::debug_handler]
pub async fn list_tests(State(state): State<AppState>) -> Result<Json<Vec<TestWithCount>>> {
    Ok(Json(state.test_service.list_tests().await?))
}

#[axum::debug_handler]
pub async fn active_test(State(state): State<AppState>) -> Result<Json<Option<ActiveTest>>> {
    Ok(Json(state.test_service.active_test().await?))
}

#[axum::debug_handler]
pub async fn create_test(
    State(state): State<AppState>,
    Json(payload): Json<CreateTestPayload>,
) -> Result<Json<CreatedTest>> {
    payload.validate()?;
    let test = state.test_service.create_test(payload).await?;
    Ok(Json(CreatedTest {
        message: "Test Created".to_string(),
        id: test.id,
    }))
}

#[axum::debug_handler]
pub async fn activate_test(
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    state.test_service.activate_test(test_id).await?;
    Ok(Json(MessageResponse::new("Test activated")))
}

#[axum::debug_handler]
pub async fn deactivate_test(
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    state.test_service.deactivate_test(test_id).await?;
    Ok(Json(MessageResponse::new("Test deactivated")))
}

#[axum::debug_handler]
pub async fn delete_test(
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    let title = state.test_service.delete_test(test_id).await?;
    Ok(Json(MessageResponse::new(format!("Test '{title}' deleted"))))
}

#[axum::debug_handler]
pub async fn list_questions(
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
) -> Result<Json<Vec<QuestionSummary>>> {
    Ok(Json(state.test_service.list_questions(test_id).await?))
}

#[axum::debug_handler]
pub async fn add_question(
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
    Json(payload): Json<AddQuestionPayload>,
) -> Result<Json<QuestionAdded>> {
    payload.validate()?;
    let question_id = state.test_service.add_question(test_id, payload).await?;
    Ok(Json(QuestionAdded {
        message: "Question added".to_string(),
        question_id,
    }))
}

#[axum::debug_handler]
pub async fn delete_question(
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    state.test_service.delete_question(question_id).await?;
    Ok(Json(MessageResponse::new("Question deleted")))
}

#[axum::debug_handler]
pub async fn test_results(
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
) -> Result<Json<Vec<SessionResult>>> {
    Ok(Json(state.test_service.test_results(test_id).await?))
}

#[axum::debug_handler]
pub async fn check_admin(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<AdminCheck>> {
    Ok(Json(state.user_service.check_admin(user_id).await?))
}

#[axum::debug_handler]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserOverview>>> {
    Ok(Json(state.user_service.list_users().await?))
}

#[axum::debug_handler]
pub async fn session_report(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> Result<Json<UserReport>> {
    Ok(Json(state.test_service.session_report(session_id).await?))
}

/// Queues grading and returns immediately.
#[axum::debug_handler]
pub async fn start_evaluation(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    state.session_service.require_session(session_id).await?;
    state.evaluation_queue.enqueue(session_id)?;
    Ok(Json(MessageResponse::new(
        "Evaluation started. Refresh page in a few moments.",
    )))
}
