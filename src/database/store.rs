//! Persistence seam for the session engine and the evaluation pipeline.
//!
//! Everything the two components read or write goes through [`SessionStore`],
//! so they can be driven by Postgres in production and by an in-memory store
//! in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::models::question::Question;
use crate::models::test_session::TestSession;
use crate::models::user_response::{NewResponse, UserResponse};

/// Session pointer after a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerRecorded {
    pub next_index: i32,
    pub is_completed: bool,
}

/// Score and feedback for one stored response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationResult {
    pub response_id: i64,
    pub score: i32,
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionTimer {
    pub session_id: i64,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub is_completed: bool,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find_session(&self, session_id: i64) -> Result<Option<TestSession>>;

    async fn find_session_for(&self, user_id: i64, test_id: i64) -> Result<Option<TestSession>>;

    async fn question_ids_for_test(&self, test_id: i64) -> Result<Vec<i64>>;

    /// Inserts a fresh session at index 0. If a session for the pair already
    /// exists (including one created concurrently) that session is returned
    /// and `question_order` is ignored.
    async fn create_session(
        &self,
        user_id: i64,
        test_id: i64,
        question_order: Vec<i64>,
    ) -> Result<TestSession>;

    async fn find_question(&self, question_id: i64) -> Result<Option<Question>>;

    async fn mark_completed(&self, session_id: i64) -> Result<()>;

    /// Stores the response and advances the pointer as one atomic unit.
    ///
    /// Returns `None` without writing anything when the session is no longer
    /// at `expected_index` or has been completed in the meantime.
    async fn record_answer(
        &self,
        session_id: i64,
        expected_index: i32,
        response: NewResponse,
    ) -> Result<Option<AnswerRecorded>>;

    async fn responses_with_questions(
        &self,
        session_id: i64,
    ) -> Result<Vec<(UserResponse, Question)>>;

    /// Writes all results in a single commit.
    async fn save_evaluations(&self, results: &[EvaluationResult]) -> Result<()>;

    /// Sets the in-progress evaluation marker. Returns `false` when another run
    /// holds a marker younger than `stale_after`.
    async fn claim_evaluation(&self, session_id: i64, stale_after: chrono::Duration)
        -> Result<bool>;

    /// Moves the marker of a running evaluation forward so it does not go stale.
    async fn refresh_evaluation(&self, session_id: i64) -> Result<()>;

    async fn release_evaluation(&self, session_id: i64) -> Result<()>;

    async fn session_timer(&self, session_id: i64) -> Result<Option<SessionTimer>>;
}
