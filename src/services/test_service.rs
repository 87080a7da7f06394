use sqlx::PgPool;

use crate::dto::admin_dto::{
    ActiveTest, AddQuestionPayload, CreateTestPayload, ReportAnswer, SessionResult, UserReport,
};
use crate::error::{Error, Result};
use crate::models::question::{QuestionSummary, GENERAL_INSTRUCTION};
use crate::models::test::{Test, TestWithCount};

/// Admin management of tests, their questions and the sessions taken on them.
#[derive(Clone)]
pub struct TestService {
    pool: PgPool,
}

impl TestService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_tests(&self) -> Result<Vec<TestWithCount>> {
        let tests = sqlx::query_as::<_, TestWithCount>(
            r#"
            SELECT t.id, t.title, t.duration_minutes, t.is_active,
                   COUNT(q.id) AS question_count
            FROM tests t
            LEFT JOIN questions q ON q.test_id = t.id
            GROUP BY t.id
            ORDER BY t.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tests)
    }

    pub async fn active_test(&self) -> Result<Option<ActiveTest>> {
        let test = sqlx::query_as::<_, ActiveTest>(
            r#"
            SELECT t.id, t.title, COUNT(q.id) AS question_count
            FROM tests t
            LEFT JOIN questions q ON q.test_id = t.id
            WHERE t.is_active
            GROUP BY t.id
            ORDER BY t.id
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(test)
    }

    /// New tests start inactive.
    pub async fn create_test(&self, payload: CreateTestPayload) -> Result<Test> {
        let test = sqlx::query_as::<_, Test>(
            r#"
            INSERT INTO tests (title, duration_minutes, is_active)
            VALUES ($1, $2, FALSE)
            RETURNING id, title, duration_minutes, is_active, created_at
            "#,
        )
        .bind(payload.title.trim())
        .bind(payload.duration_minutes)
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(test_id = test.id, title = %test.title, "test created");
        Ok(test)
    }

    /// Makes `test_id` the only active test.
    pub async fn activate_test(&self, test_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(r#"UPDATE tests SET is_active = FALSE WHERE id <> $1 AND is_active"#)
            .bind(test_id)
            .execute(&mut *tx)
            .await?;
        let updated = sqlx::query(r#"UPDATE tests SET is_active = TRUE WHERE id = $1"#)
            .bind(test_id)
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(Error::NotFound("Test not found".to_string()));
        }
        tx.commit().await?;
        tracing::info!(test_id, "test activated");
        Ok(())
    }

    pub async fn deactivate_test(&self, test_id: i64) -> Result<()> {
        let updated = sqlx::query(r#"UPDATE tests SET is_active = FALSE WHERE id = $1"#)
            .bind(test_id)
            .execute(&self.pool)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(Error::NotFound("Test not found".to_string()));
        }
        Ok(())
    }

    /// Deletes the test; questions, sessions and responses go with it.
    /// Returns the deleted title.
    pub async fn delete_test(&self, test_id: i64) -> Result<String> {
        let title = sqlx::query_scalar::<_, String>(
            r#"DELETE FROM tests WHERE id = $1 RETURNING title"#,
        )
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Test not found".to_string()))?;
        tracing::info!(test_id, title = %title, "test deleted");
        Ok(title)
    }

    pub async fn list_questions(&self, test_id: i64) -> Result<Vec<QuestionSummary>> {
        let questions = sqlx::query_as::<_, QuestionSummary>(
            r#"SELECT id, task_id, link FROM questions WHERE test_id = $1 ORDER BY id"#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }

    pub async fn add_question(&self, test_id: i64, payload: AddQuestionPayload) -> Result<i64> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (SELECT 1 FROM tests WHERE id = $1)"#,
        )
        .bind(test_id)
        .fetch_one(&self.pool)
        .await?;
        if !exists {
            return Err(Error::NotFound("Test not found".to_string()));
        }

        let question_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO questions
                (test_id, task_id, link, description, ideal_status, ideal_explanation, ideal_error)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(test_id)
        .bind(payload.task_id.as_deref().map(str::trim).filter(|s| !s.is_empty()))
        .bind(payload.link.trim())
        .bind(GENERAL_INSTRUCTION)
        .bind(payload.ideal_status.unwrap_or_default())
        .bind(payload.ideal_explanation.unwrap_or_default())
        .bind(payload.ideal_error.unwrap_or_default())
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(test_id, question_id, "question added");
        Ok(question_id)
    }

    /// Refused while an unfinished session still has the question in its
    /// order; that session could never advance past it.
    pub async fn delete_question(&self, question_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(r#"SELECT id FROM questions WHERE id = $1 FOR UPDATE"#)
            .bind(question_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound("Question not found".to_string()))?;

        let in_use = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM test_sessions
                WHERE NOT is_completed AND $1 = ANY(question_order)
            )
            "#,
        )
        .bind(question_id)
        .fetch_one(&mut *tx)
        .await?;
        if in_use {
            tx.rollback().await?;
            tracing::warn!(question_id, "refusing to delete question used by an open session");
            return Err(Error::InvalidState(
                "Question is part of a session that is still in progress".to_string(),
            ));
        }

        sqlx::query(r#"DELETE FROM questions WHERE id = $1"#)
            .bind(question_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::info!(question_id, "question deleted");
        Ok(())
    }

    pub async fn test_results(&self, test_id: i64) -> Result<Vec<SessionResult>> {
        let results = sqlx::query_as::<_, SessionResult>(
            r#"
            SELECT s.id, u.username, s.is_completed, s.current_index
            FROM test_sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.test_id = $1
            ORDER BY s.id
            "#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(results)
    }

    /// Answers of one session next to the ideal answers and any AI grade.
    pub async fn session_report(&self, session_id: i64) -> Result<UserReport> {
        let user = sqlx::query_scalar::<_, String>(
            r#"
            SELECT u.username
            FROM test_sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

        let answers = sqlx::query_as::<_, ReportAnswer>(
            r#"
            SELECT q.id AS question_id, q.link, q.description,
                   r.status AS user_status, r.explanation AS user_explanation,
                   r.critical_error AS user_error,
                   q.ideal_status, q.ideal_explanation,
                   r.ai_score, r.ai_feedback
            FROM user_responses r
            JOIN questions q ON q.id = r.question_id
            WHERE r.session_id = $1
            ORDER BY r.id
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(UserReport { user, answers })
    }
}
