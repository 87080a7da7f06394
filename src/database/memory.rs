//! In-memory [`SessionStore`] used by unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::database::store::{AnswerRecorded, EvaluationResult, SessionStore, SessionTimer};
use crate::error::{Error, Result};
use crate::models::question::{Question, GENERAL_INSTRUCTION};
use crate::models::test_session::TestSession;
use crate::models::user_response::{NewResponse, UserResponse};

#[derive(Default)]
struct Inner {
    next_id: i64,
    test_durations: HashMap<i64, i32>,
    questions: BTreeMap<i64, Question>,
    sessions: BTreeMap<i64, TestSession>,
    responses: BTreeMap<i64, UserResponse>,
}

impl Inner {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    inner: Mutex<Inner>,
    fail_saves: AtomicBool,
    marker_refreshes: AtomicUsize,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_test(&self, duration_minutes: i32) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.id();
        inner.test_durations.insert(id, duration_minutes);
        id
    }

    pub(crate) fn add_question(&self, test_id: i64, ideal_status: Option<&str>) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.id();
        inner.questions.insert(
            id,
            Question {
                id,
                test_id,
                task_id: Some(format!("TASK-{id}")),
                link: format!("https://tasks.example.com/{id}"),
                description: GENERAL_INSTRUCTION.to_string(),
                ideal_status: ideal_status.map(str::to_string),
                ideal_explanation: Some(format!("ideal explanation {id}")),
                ideal_error: Some(format!("ideal critical error {id}")),
            },
        );
        id
    }

    /// Inserts a session directly, bypassing the engine.
    pub(crate) fn insert_session(&self, user_id: i64, test_id: i64, order: Vec<i64>) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.id();
        inner.sessions.insert(
            id,
            TestSession {
                id,
                user_id,
                test_id,
                question_order: order,
                current_index: 0,
                is_completed: false,
                start_time: Utc::now(),
                evaluation_started_at: None,
            },
        );
        id
    }

    /// Forces the pointer, e.g. to reproduce a missed completion flag.
    pub(crate) fn set_index(&self, session_id: i64, current_index: i32) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(session) = inner.sessions.get_mut(&session_id) {
            session.current_index = current_index;
        }
    }

    pub(crate) fn insert_response(&self, session_id: i64, question_id: i64, status: &str) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.id();
        inner.responses.insert(
            id,
            UserResponse {
                id,
                session_id,
                question_id,
                status: status.to_string(),
                explanation: format!("user explanation {question_id}"),
                critical_error: format!("user critical error {question_id}"),
                ai_score: None,
                ai_feedback: None,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub(crate) fn session(&self, session_id: i64) -> Option<TestSession> {
        self.inner.lock().unwrap().sessions.get(&session_id).cloned()
    }

    pub(crate) fn responses(&self, session_id: i64) -> Vec<UserResponse> {
        self.inner
            .lock()
            .unwrap()
            .responses
            .values()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect()
    }

    pub(crate) fn response(&self, response_id: i64) -> Option<UserResponse> {
        self.inner.lock().unwrap().responses.get(&response_id).cloned()
    }

    pub(crate) fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst);
    }

    pub(crate) fn marker_refreshes(&self) -> usize {
        self.marker_refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find_session(&self, session_id: i64) -> Result<Option<TestSession>> {
        Ok(self.session(session_id))
    }

    async fn find_session_for(&self, user_id: i64, test_id: i64) -> Result<Option<TestSession>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .sessions
            .values()
            .find(|s| s.user_id == user_id && s.test_id == test_id)
            .cloned())
    }

    async fn question_ids_for_test(&self, test_id: i64) -> Result<Vec<i64>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .questions
            .values()
            .filter(|q| q.test_id == test_id)
            .map(|q| q.id)
            .collect())
    }

    async fn create_session(
        &self,
        user_id: i64,
        test_id: i64,
        question_order: Vec<i64>,
    ) -> Result<TestSession> {
        if let Some(existing) = self.find_session_for(user_id, test_id).await? {
            return Ok(existing);
        }
        let id = self.insert_session(user_id, test_id, question_order);
        Ok(self.session(id).expect("session just inserted"))
    }

    async fn find_question(&self, question_id: i64) -> Result<Option<Question>> {
        Ok(self.inner.lock().unwrap().questions.get(&question_id).cloned())
    }

    async fn mark_completed(&self, session_id: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(session) = inner.sessions.get_mut(&session_id) {
            session.is_completed = true;
        }
        Ok(())
    }

    async fn record_answer(
        &self,
        session_id: i64,
        expected_index: i32,
        response: NewResponse,
    ) -> Result<Option<AnswerRecorded>> {
        let mut inner = self.inner.lock().unwrap();
        let response_id = inner.id();
        let Some(session) = inner.sessions.get_mut(&session_id) else {
            return Ok(None);
        };
        if session.is_completed || session.current_index != expected_index {
            return Ok(None);
        }
        session.current_index += 1;
        session.is_completed = session.current_index >= session.total_questions();
        let recorded = AnswerRecorded {
            next_index: session.current_index,
            is_completed: session.is_completed,
        };
        inner.responses.insert(
            response_id,
            UserResponse {
                id: response_id,
                session_id,
                question_id: response.question_id,
                status: response.status,
                explanation: response.explanation,
                critical_error: response.critical_error,
                ai_score: None,
                ai_feedback: None,
                created_at: Utc::now(),
            },
        );
        Ok(Some(recorded))
    }

    async fn responses_with_questions(
        &self,
        session_id: i64,
    ) -> Result<Vec<(UserResponse, Question)>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .responses
            .values()
            .filter(|r| r.session_id == session_id)
            .filter_map(|r| {
                inner
                    .questions
                    .get(&r.question_id)
                    .map(|q| (r.clone(), q.clone()))
            })
            .collect())
    }

    async fn save_evaluations(&self, results: &[EvaluationResult]) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::Internal("simulated commit failure".into()));
        }
        let mut inner = self.inner.lock().unwrap();
        for result in results {
            if let Some(response) = inner.responses.get_mut(&result.response_id) {
                response.ai_score = Some(result.score);
                response.ai_feedback = Some(result.feedback.clone());
            }
        }
        Ok(())
    }

    async fn claim_evaluation(
        &self,
        session_id: i64,
        stale_after: chrono::Duration,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let Some(session) = inner.sessions.get_mut(&session_id) else {
            return Ok(false);
        };
        let now = Utc::now();
        match session.evaluation_started_at {
            Some(started) if started > now - stale_after => Ok(false),
            _ => {
                session.evaluation_started_at = Some(now);
                Ok(true)
            }
        }
    }

    async fn refresh_evaluation(&self, session_id: i64) -> Result<()> {
        self.marker_refreshes.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        if let Some(session) = inner.sessions.get_mut(&session_id) {
            if session.evaluation_started_at.is_some() {
                session.evaluation_started_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn release_evaluation(&self, session_id: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(session) = inner.sessions.get_mut(&session_id) {
            session.evaluation_started_at = None;
        }
        Ok(())
    }

    async fn session_timer(&self, session_id: i64) -> Result<Option<SessionTimer>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.sessions.get(&session_id).map(|s| SessionTimer {
            session_id: s.id,
            start_time: s.start_time,
            duration_minutes: inner.test_durations.get(&s.test_id).copied().unwrap_or(0),
            is_completed: s.is_completed,
        }))
    }
}
