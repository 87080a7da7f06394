use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Instruction shown with every task.
pub const GENERAL_INSTRUCTION: &str = "Solve the task and write the task status, task explanation, and critical error if task is failure.";

/// Full question row, including the ideal answer.
///
/// Never serialize this to the taking user; convert to
/// [`crate::dto::session_dto::QuestionOut`] instead.
#[derive(Debug, Clone, FromRow)]
pub struct Question {
    pub id: i64,
    pub test_id: i64,
    pub task_id: Option<String>,
    pub link: String,
    pub description: String,
    pub ideal_status: Option<String>,
    pub ideal_explanation: Option<String>,
    pub ideal_error: Option<String>,
}

impl Question {
    /// True when an admin supplied a ground-truth status to grade against.
    pub fn has_ideal_answer(&self) -> bool {
        self.ideal_status
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Admin listing row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionSummary {
    pub id: i64,
    pub task_id: Option<String>,
    pub link: String,
}
