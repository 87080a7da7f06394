use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestSession {
    pub id: i64,
    pub user_id: i64,
    pub test_id: i64,
    /// Fixed at creation; never rewritten.
    pub question_order: Vec<i64>,
    pub current_index: i32,
    pub is_completed: bool,
    pub start_time: DateTime<Utc>,
    pub evaluation_started_at: Option<DateTime<Utc>>,
}

impl TestSession {
    pub fn total_questions(&self) -> i32 {
        self.question_order.len() as i32
    }

    /// Question the session is waiting for, or `None` once every slot has been answered.
    pub fn expected_question(&self) -> Option<i64> {
        usize::try_from(self.current_index)
            .ok()
            .and_then(|idx| self.question_order.get(idx).copied())
    }
}
