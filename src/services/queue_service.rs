use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::services::eval_service::{EvaluationOutcome, EvaluationService};

/// Hands session ids to a background dispatcher so the trigger never waits
/// on grading.
#[derive(Clone)]
pub struct EvaluationQueue {
    tx: mpsc::UnboundedSender<i64>,
}

impl EvaluationQueue {
    /// Spawns the dispatcher. Each job runs on its own task; the dispatcher
    /// exits once every queue handle is dropped.
    pub fn start(service: Arc<EvaluationService>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<i64>();

        let handle = tokio::spawn(async move {
            while let Some(session_id) = rx.recv().await {
                let service = service.clone();
                tokio::spawn(async move {
                    match service.evaluate_session(session_id).await {
                        Ok(EvaluationOutcome::Completed { graded }) => {
                            tracing::debug!(session_id, graded, "evaluation job done");
                        }
                        Ok(EvaluationOutcome::AlreadyRunning) => {}
                        Err(e) => {
                            tracing::error!(session_id, error = %e, "evaluation job failed");
                        }
                    }
                });
            }
            tracing::info!("evaluation dispatcher stopped");
        });

        (Self { tx }, handle)
    }

    pub fn enqueue(&self, session_id: i64) -> Result<()> {
        self.tx
            .send(session_id)
            .map_err(|_| Error::Internal("Evaluation queue is not running".to_string()))?;
        tracing::info!(session_id, "evaluation queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::services::ai_service::{GradingOracle, MockGradingOracle};
    use crate::services::eval_service::EvaluationSettings;
    use std::time::Duration;

    #[tokio::test]
    async fn queued_session_gets_graded_in_background() {
        let store = Arc::new(MemoryStore::new());
        let test_id = store.add_test(60);
        let q = store.add_question(test_id, Some("Success"));
        let session_id = store.insert_session(3, test_id, vec![q]);
        let response_id = store.insert_response(session_id, q, "Success");

        let mut oracle = MockGradingOracle::new();
        oracle
            .expect_grade()
            .times(1)
            .returning(|_| Ok("SCORE: 64\nFEEDBACK: decent".to_string()));

        let service = EvaluationService::new(
            store.clone(),
            Some(Arc::new(oracle) as Arc<dyn GradingOracle>),
            EvaluationSettings {
                max_tokens: 500,
                temperature: 0.3,
                call_timeout: Duration::from_secs(1),
                concurrency: 1,
                claim_ttl: chrono::Duration::minutes(15),
            },
        );
        let (queue, _dispatcher) = EvaluationQueue::start(Arc::new(service));
        queue.enqueue(session_id).unwrap();

        let mut score = None;
        for _ in 0..100 {
            score = store.response(response_id).and_then(|r| r.ai_score);
            if score.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(score, Some(64));
    }

    #[tokio::test]
    async fn enqueue_fails_once_dispatcher_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel::<i64>();
        drop(rx);
        let queue = EvaluationQueue { tx };
        assert!(matches!(queue.enqueue(1), Err(Error::Internal(_))));
    }
}
