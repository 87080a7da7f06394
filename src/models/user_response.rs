use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserResponse {
    pub id: i64,
    pub session_id: i64,
    pub question_id: i64,
    pub status: String,
    pub explanation: String,
    pub critical_error: String,
    pub ai_score: Option<i32>,
    pub ai_feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Answer fields submitted by the taking user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewResponse {
    pub question_id: i64,
    pub status: String,
    pub explanation: String,
    pub critical_error: String,
}
