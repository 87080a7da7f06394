use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::database::store::{AnswerRecorded, EvaluationResult, SessionStore, SessionTimer};
use crate::error::Result;
use crate::models::question::Question;
use crate::models::test_session::TestSession;
use crate::models::user_response::{NewResponse, UserResponse};

const SESSION_COLUMNS: &str = "id, user_id, test_id, question_order, current_index, is_completed, start_time, evaluation_started_at";

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ResponseQuestionRow {
    response_id: i64,
    session_id: i64,
    question_id: i64,
    status: String,
    explanation: String,
    critical_error: String,
    ai_score: Option<i32>,
    ai_feedback: Option<String>,
    created_at: DateTime<Utc>,
    test_id: i64,
    task_id: Option<String>,
    link: String,
    description: String,
    ideal_status: Option<String>,
    ideal_explanation: Option<String>,
    ideal_error: Option<String>,
}

impl ResponseQuestionRow {
    fn split(self) -> (UserResponse, Question) {
        let response = UserResponse {
            id: self.response_id,
            session_id: self.session_id,
            question_id: self.question_id,
            status: self.status,
            explanation: self.explanation,
            critical_error: self.critical_error,
            ai_score: self.ai_score,
            ai_feedback: self.ai_feedback,
            created_at: self.created_at,
        };
        let question = Question {
            id: self.question_id,
            test_id: self.test_id,
            task_id: self.task_id,
            link: self.link,
            description: self.description,
            ideal_status: self.ideal_status,
            ideal_explanation: self.ideal_explanation,
            ideal_error: self.ideal_error,
        };
        (response, question)
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn find_session(&self, session_id: i64) -> Result<Option<TestSession>> {
        let session = sqlx::query_as::<_, TestSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM test_sessions WHERE id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn find_session_for(&self, user_id: i64, test_id: i64) -> Result<Option<TestSession>> {
        let session = sqlx::query_as::<_, TestSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM test_sessions WHERE user_id = $1 AND test_id = $2"
        ))
        .bind(user_id)
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn question_ids_for_test(&self, test_id: i64) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"SELECT id FROM questions WHERE test_id = $1 ORDER BY id"#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn create_session(
        &self,
        user_id: i64,
        test_id: i64,
        question_order: Vec<i64>,
    ) -> Result<TestSession> {
        let inserted = sqlx::query_as::<_, TestSession>(&format!(
            r#"
            INSERT INTO test_sessions (user_id, test_id, question_order, current_index, is_completed)
            VALUES ($1, $2, $3, 0, FALSE)
            ON CONFLICT (user_id, test_id) DO NOTHING
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(test_id)
        .bind(&question_order)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(session) => Ok(session),
            None => {
                tracing::debug!(user_id, test_id, "session created concurrently, reusing it");
                let existing = sqlx::query_as::<_, TestSession>(&format!(
                    "SELECT {SESSION_COLUMNS} FROM test_sessions WHERE user_id = $1 AND test_id = $2"
                ))
                .bind(user_id)
                .bind(test_id)
                .fetch_one(&self.pool)
                .await?;
                Ok(existing)
            }
        }
    }

    async fn find_question(&self, question_id: i64) -> Result<Option<Question>> {
        let question = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, test_id, task_id, link, description,
                   ideal_status, ideal_explanation, ideal_error
            FROM questions WHERE id = $1
            "#,
        )
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(question)
    }

    async fn mark_completed(&self, session_id: i64) -> Result<()> {
        sqlx::query(r#"UPDATE test_sessions SET is_completed = TRUE WHERE id = $1"#)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_answer(
        &self,
        session_id: i64,
        expected_index: i32,
        response: NewResponse,
    ) -> Result<Option<AnswerRecorded>> {
        let mut tx = self.pool.begin().await?;

        // The conditional update takes the row lock, so a racing duplicate
        // submission either waits and then matches nothing, or wins.
        let advanced = sqlx::query_as::<_, (i32, bool)>(
            r#"
            UPDATE test_sessions
            SET current_index = current_index + 1,
                is_completed = (current_index + 1 >= cardinality(question_order))
            WHERE id = $1 AND current_index = $2 AND NOT is_completed
            RETURNING current_index, is_completed
            "#,
        )
        .bind(session_id)
        .bind(expected_index)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((next_index, is_completed)) = advanced else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO user_responses (session_id, question_id, status, explanation, critical_error)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(session_id)
        .bind(response.question_id)
        .bind(&response.status)
        .bind(&response.explanation)
        .bind(&response.critical_error)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(AnswerRecorded {
            next_index,
            is_completed,
        }))
    }

    async fn responses_with_questions(
        &self,
        session_id: i64,
    ) -> Result<Vec<(UserResponse, Question)>> {
        let rows = sqlx::query_as::<_, ResponseQuestionRow>(
            r#"
            SELECT r.id AS response_id, r.session_id, r.question_id, r.status, r.explanation,
                   r.critical_error, r.ai_score, r.ai_feedback, r.created_at,
                   q.test_id, q.task_id, q.link, q.description,
                   q.ideal_status, q.ideal_explanation, q.ideal_error
            FROM user_responses r
            JOIN questions q ON q.id = r.question_id
            WHERE r.session_id = $1
            ORDER BY r.id
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ResponseQuestionRow::split).collect())
    }

    async fn save_evaluations(&self, results: &[EvaluationResult]) -> Result<()> {
        if results.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = results.iter().map(|r| r.response_id).collect();
        let scores: Vec<i32> = results.iter().map(|r| r.score).collect();
        let feedback: Vec<String> = results.iter().map(|r| r.feedback.clone()).collect();

        sqlx::query(
            r#"
            UPDATE user_responses AS r
            SET ai_score = u.score, ai_feedback = u.feedback
            FROM UNNEST($1::bigint[], $2::int[], $3::text[]) AS u(id, score, feedback)
            WHERE r.id = u.id
            "#,
        )
        .bind(&ids)
        .bind(&scores)
        .bind(&feedback)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn claim_evaluation(
        &self,
        session_id: i64,
        stale_after: chrono::Duration,
    ) -> Result<bool> {
        let claimed = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE test_sessions
            SET evaluation_started_at = NOW()
            WHERE id = $1
              AND (evaluation_started_at IS NULL
                   OR evaluation_started_at < NOW() - make_interval(secs => $2::double precision))
            RETURNING id
            "#,
        )
        .bind(session_id)
        .bind(stale_after.num_seconds() as f64)
        .fetch_optional(&self.pool)
        .await?;
        Ok(claimed.is_some())
    }

    async fn refresh_evaluation(&self, session_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE test_sessions SET evaluation_started_at = NOW()
            WHERE id = $1 AND evaluation_started_at IS NOT NULL
            "#,
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release_evaluation(&self, session_id: i64) -> Result<()> {
        sqlx::query(r#"UPDATE test_sessions SET evaluation_started_at = NULL WHERE id = $1"#)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn session_timer(&self, session_id: i64) -> Result<Option<SessionTimer>> {
        let row = sqlx::query_as::<_, (i64, DateTime<Utc>, i32, bool)>(
            r#"
            SELECT s.id, s.start_time, t.duration_minutes, s.is_completed
            FROM test_sessions s
            JOIN tests t ON t.id = s.test_id
            WHERE s.id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(session_id, start_time, duration_minutes, is_completed)| SessionTimer {
            session_id,
            start_time,
            duration_minutes,
            is_completed,
        }))
    }
}
