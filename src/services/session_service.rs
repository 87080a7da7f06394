use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::database::store::{SessionStore, SessionTimer};
use crate::dto::session_dto::{CurrentQuestion, SessionInfo, SubmitAck};
use crate::error::{Error, Result};
use crate::models::test::DEFAULT_DURATION_MINUTES;
use crate::models::user_response::NewResponse;

/// Lifecycle of a test-taking session: randomized order, strictly sequential
/// answers, completion detection.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
}

impl SessionService {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Returns the existing session for the pair untouched, or creates one
    /// with a freshly shuffled question order.
    pub async fn start_session(&self, test_id: i64, user_id: i64) -> Result<SessionInfo> {
        if let Some(existing) = self.store.find_session_for(user_id, test_id).await? {
            tracing::debug!(session_id = existing.id, user_id, test_id, "resuming test session");
            return Ok(SessionInfo::from(&existing));
        }

        let mut order = self.store.question_ids_for_test(test_id).await?;
        if order.is_empty() {
            return Err(Error::NotFound("Test has no questions".to_string()));
        }
        order.shuffle(&mut rand::thread_rng());

        let session = self.store.create_session(user_id, test_id, order).await?;
        tracing::info!(
            session_id = session.id,
            user_id,
            test_id,
            total_questions = session.total_questions(),
            "test session started"
        );
        Ok(SessionInfo::from(&session))
    }

    pub async fn get_current_question(&self, session_id: i64) -> Result<CurrentQuestion> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

        if session.is_completed {
            return Err(Error::InvalidState("Test is already completed".to_string()));
        }

        let Some(question_id) = session.expected_question() else {
            // Every slot is answered but the flag was never set.
            self.store.mark_completed(session_id).await?;
            tracing::info!(session_id, "test session completed on read");
            return Ok(CurrentQuestion::JustCompleted);
        };

        let question = self
            .store
            .find_question(question_id)
            .await?
            .ok_or_else(|| Error::NotFound("Question not found".to_string()))?;

        Ok(CurrentQuestion::Question(question.into()))
    }

    pub async fn submit_answer(&self, session_id: i64, answer: NewResponse) -> Result<SubmitAck> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .filter(|s| !s.is_completed)
            .ok_or_else(|| Error::InvalidState("Invalid session".to_string()))?;

        let Some(expected_question_id) = session.expected_question() else {
            self.store.mark_completed(session_id).await?;
            return Err(Error::InvalidState("Test is already completed".to_string()));
        };

        if answer.question_id != expected_question_id {
            tracing::warn!(
                session_id,
                submitted = answer.question_id,
                expected = expected_question_id,
                "answer submitted for the wrong question"
            );
            return Err(Error::SyncError(
                "Sync Error. You are answering the wrong question.".to_string(),
            ));
        }

        let recorded = self
            .store
            .record_answer(session_id, session.current_index, answer)
            .await?
            .ok_or_else(|| {
                Error::SyncError("Session advanced before this answer was saved.".to_string())
            })?;

        if recorded.is_completed {
            tracing::info!(session_id, answered = recorded.next_index, "test session completed");
        } else {
            tracing::debug!(session_id, next_index = recorded.next_index, "answer saved");
        }

        Ok(SubmitAck {
            message: "Answer saved".to_string(),
            next_index: recorded.next_index,
        })
    }

    /// Start time and allowed duration, for client-side countdowns.
    pub async fn timer_info(&self, session_id: i64) -> Result<SessionTimer> {
        let mut timer = self
            .store
            .session_timer(session_id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;
        if timer.duration_minutes <= 0 {
            timer.duration_minutes = DEFAULT_DURATION_MINUTES;
        }
        Ok(timer)
    }

    pub async fn require_session(&self, session_id: i64) -> Result<()> {
        self.store
            .find_session(session_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))
    }

    /// Rejects access to another user's session. Unknown sessions pass through
    /// so the engine operation itself reports them.
    pub async fn ensure_owner(&self, session_id: i64, user_id: i64) -> Result<()> {
        match self.store.find_session(session_id).await? {
            Some(session) if session.user_id != user_id => {
                Err(Error::NotFound("Session not found".to_string()))
            }
            _ => Ok(()),
        }
    }
}
