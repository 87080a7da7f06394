use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::question::Question;
use crate::models::test_session::TestSession;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: i64,
    pub current_index: i32,
    pub total_questions: i32,
    pub is_completed: bool,
}

impl From<&TestSession> for SessionInfo {
    fn from(session: &TestSession) -> Self {
        Self {
            session_id: session.id,
            current_index: session.current_index,
            total_questions: session.total_questions(),
            is_completed: session.is_completed,
        }
    }
}

/// Question as shown to the taking user. Carries no ideal-answer fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOut {
    pub id: i64,
    pub task_id: Option<String>,
    pub link: String,
    pub description: String,
}

impl From<Question> for QuestionOut {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            task_id: q.task_id,
            link: q.link,
            description: q.description,
        }
    }
}

/// Outcome of reading the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurrentQuestion {
    Question(QuestionOut),
    /// Every question was answered; this read flipped the completion flag.
    JustCompleted,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AnswerSubmit {
    pub question_id: i64,
    #[validate(length(min = 1, max = 64))]
    pub status: String,
    #[validate(length(max = 20000))]
    pub explanation: String,
    #[validate(length(max = 20000))]
    pub critical_error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAck {
    pub message: String,
    pub next_index: i32,
}
