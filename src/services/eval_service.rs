use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};

use crate::config::Config;
use crate::database::store::{EvaluationResult, SessionStore};
use crate::error::Result;
use crate::models::question::Question;
use crate::models::user_response::UserResponse;
use crate::services::ai_service::{GradeRequest, GradingOracle, OracleError};
use crate::services::grading_service::GradingService;

pub const NO_CREDENTIAL_FEEDBACK: &str = "AI Evaluation unavailable: OPENAI_API_KEY not configured.";
pub const NO_IDEAL_ANSWER_FEEDBACK: &str = "No Ideal Answer provided by Admin yet.";

#[derive(Debug, Clone)]
pub struct EvaluationSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    pub call_timeout: Duration,
    pub concurrency: usize,
    /// An in-progress marker older than this no longer blocks a new run.
    pub claim_ttl: chrono::Duration,
}

impl EvaluationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_tokens: config.grading.max_tokens,
            temperature: config.grading.temperature,
            call_timeout: config.grading.timeout,
            concurrency: config.grading.concurrency.max(1),
            claim_ttl: claim_ttl_for(config.evaluation_claim_ttl_minutes, config.grading.timeout),
        }
    }

    /// Marker refresh cadence while items are being graded.
    fn refresh_every(&self) -> Duration {
        (self.claim_ttl / 4).to_std().unwrap_or(Duration::ZERO)
    }
}

/// The claim TTL never drops below four grading timeouts. A run refreshes its
/// marker as items finish, and the next item finishes within one timeout.
pub fn claim_ttl_for(configured_minutes: i64, call_timeout: Duration) -> chrono::Duration {
    let configured = chrono::Duration::minutes(configured_minutes.max(0));
    match chrono::Duration::from_std(call_timeout.saturating_mul(4)) {
        Ok(floor) => configured.max(floor),
        Err(_) => configured,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationOutcome {
    Completed { graded: usize },
    AlreadyRunning,
}

/// Grades every stored answer of a session against its question's ideal answer.
#[derive(Clone)]
pub struct EvaluationService {
    store: Arc<dyn SessionStore>,
    oracle: Option<Arc<dyn GradingOracle>>,
    settings: EvaluationSettings,
}

impl EvaluationService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        oracle: Option<Arc<dyn GradingOracle>>,
        settings: EvaluationSettings,
    ) -> Self {
        Self {
            store,
            oracle,
            settings,
        }
    }

    pub async fn evaluate_session(&self, session_id: i64) -> Result<EvaluationOutcome> {
        if !self
            .store
            .claim_evaluation(session_id, self.settings.claim_ttl)
            .await?
        {
            tracing::info!(session_id, "evaluation already in progress, skipping");
            return Ok(EvaluationOutcome::AlreadyRunning);
        }

        let result = self.grade_session(session_id).await;

        if let Err(e) = self.store.release_evaluation(session_id).await {
            tracing::warn!(session_id, error = %e, "failed to clear evaluation marker");
        }

        let graded = result?;
        tracing::info!(session_id, graded, "session evaluation finished");
        Ok(EvaluationOutcome::Completed { graded })
    }

    async fn grade_session(&self, session_id: i64) -> Result<usize> {
        let pairs = self.store.responses_with_questions(session_id).await?;
        if pairs.is_empty() {
            return Ok(0);
        }

        let total = pairs.len();
        let mut grading = stream::iter(pairs)
            .map(|(response, question)| self.grade_one(response, question))
            .buffer_unordered(self.settings.concurrency);

        let refresh_every = self.settings.refresh_every();
        let mut refreshed_at = Instant::now();
        let mut results: Vec<EvaluationResult> = Vec::with_capacity(total);
        while let Some(result) = grading.next().await {
            results.push(result);
            if results.len() < total && refreshed_at.elapsed() >= refresh_every {
                if let Err(e) = self.store.refresh_evaluation(session_id).await {
                    tracing::warn!(session_id, error = %e, "failed to refresh evaluation marker");
                }
                refreshed_at = Instant::now();
            }
        }

        self.store.save_evaluations(&results).await?;
        Ok(results.len())
    }

    async fn grade_one(&self, response: UserResponse, question: Question) -> EvaluationResult {
        let (score, feedback) = match self.oracle.as_deref() {
            None => (0, NO_CREDENTIAL_FEEDBACK.to_string()),
            Some(_) if !question.has_ideal_answer() => (0, NO_IDEAL_ANSWER_FEEDBACK.to_string()),
            Some(oracle) => {
                let request = GradeRequest {
                    prompt: GradingService::build_prompt(&response, &question),
                    max_tokens: self.settings.max_tokens,
                    temperature: self.settings.temperature,
                };
                let reply = tokio::time::timeout(self.settings.call_timeout, oracle.grade(&request))
                    .await
                    .unwrap_or_else(|_| {
                        Err(OracleError::Timeout(self.settings.call_timeout.as_secs()))
                    });

                match reply {
                    Ok(text) => {
                        let parsed = GradingService::parse_reply(&text);
                        (parsed.score, parsed.feedback)
                    }
                    Err(e) => {
                        tracing::warn!(
                            response_id = response.id,
                            question_id = question.id,
                            error = %e,
                            "grading call failed"
                        );
                        (0, format!("AI Error: {e}"))
                    }
                }
            }
        };

        EvaluationResult {
            response_id: response.id,
            score,
            feedback,
        }
    }
}
