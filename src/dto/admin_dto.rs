use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::test::DEFAULT_DURATION_MINUTES;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTestPayload {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[serde(default = "default_duration")]
    #[validate(range(min = 1, max = 10080))]
    pub duration_minutes: i32,
}

fn default_duration() -> i32 {
    DEFAULT_DURATION_MINUTES
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddQuestionPayload {
    #[validate(length(max = 255))]
    pub task_id: Option<String>,
    #[validate(url)]
    pub link: String,
    #[validate(length(max = 64))]
    pub ideal_status: Option<String>,
    pub ideal_explanation: Option<String>,
    pub ideal_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedTest {
    pub message: String,
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionAdded {
    pub message: String,
    pub question_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActiveTest {
    pub id: i64,
    pub title: String,
    pub question_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionResult {
    pub id: i64,
    pub username: String,
    pub is_completed: bool,
    pub current_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminCheck {
    pub is_admin: bool,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressStatus {
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
}

impl ProgressStatus {
    pub fn from_session(session_id: Option<i64>, is_completed: Option<bool>) -> Self {
        match (session_id, is_completed) {
            (_, Some(true)) => ProgressStatus::Completed,
            (Some(_), _) => ProgressStatus::InProgress,
            (None, _) => ProgressStatus::NotStarted,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserOverview {
    pub id: i64,
    pub username: String,
    pub status: ProgressStatus,
    pub session_id: Option<i64>,
    pub test_id: Option<i64>,
    pub test_title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReportAnswer {
    pub question_id: i64,
    pub link: String,
    pub description: String,
    pub user_status: String,
    pub user_explanation: String,
    pub user_error: String,
    pub ideal_status: Option<String>,
    pub ideal_explanation: Option<String>,
    pub ai_score: Option<i32>,
    pub ai_feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReport {
    pub user: String,
    pub answers: Vec<ReportAnswer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_status_reflects_session_state() {
        assert_eq!(ProgressStatus::from_session(None, None), ProgressStatus::NotStarted);
        assert_eq!(
            ProgressStatus::from_session(Some(4), Some(false)),
            ProgressStatus::InProgress
        );
        assert_eq!(
            ProgressStatus::from_session(Some(4), Some(true)),
            ProgressStatus::Completed
        );
        assert_eq!(
            serde_json::to_value(ProgressStatus::NotStarted).unwrap(),
            serde_json::json!("Not Started")
        );
    }

    #[test]
    fn question_link_must_be_a_url() {
        let payload = AddQuestionPayload {
            task_id: None,
            link: "not a link".into(),
            ideal_status: None,
            ideal_explanation: None,
            ideal_error: None,
        };
        assert!(payload.validate().is_err());
    }
}
