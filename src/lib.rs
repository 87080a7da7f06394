pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use sqlx::PgPool;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::database::pg_store::PgSessionStore;
use crate::database::store::SessionStore;
use crate::error::Result;
use crate::services::{
    ai_service::{GradingOracle, OpenAiGrader},
    eval_service::{EvaluationService, EvaluationSettings},
    queue_service::EvaluationQueue,
    session_service::SessionService,
    test_service::TestService,
    user_service::UserService,
};

#[derive(Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub auth: AuthSettings,
    pub session_service: SessionService,
    pub evaluation_queue: EvaluationQueue,
    pub test_service: TestService,
    pub user_service: UserService,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        auth: AuthSettings,
        store: Arc<dyn SessionStore>,
        evaluation_queue: EvaluationQueue,
    ) -> Self {
        Self {
            session_service: SessionService::new(store),
            test_service: TestService::new(pool.clone()),
            user_service: UserService::new(pool.clone()),
            pool,
            auth,
            evaluation_queue,
        }
    }

    /// Wires the Postgres-backed services and starts the evaluation
    /// dispatcher. Must be called inside a Tokio runtime.
    pub fn from_config(pool: PgPool, config: &Config) -> Result<(Self, JoinHandle<()>)> {
        let store: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(pool.clone()));

        let oracle = OpenAiGrader::from_config(&config.grading)?
            .map(|grader| Arc::new(grader) as Arc<dyn GradingOracle>);
        if oracle.is_none() {
            tracing::warn!("OPENAI_API_KEY not set; evaluations will record score 0");
        }

        let evaluation_service = EvaluationService::new(
            store.clone(),
            oracle,
            EvaluationSettings::from_config(config),
        );
        let (evaluation_queue, dispatcher) = EvaluationQueue::start(Arc::new(evaluation_service));

        let auth = AuthSettings {
            jwt_secret: config.jwt_secret.clone(),
            jwt_ttl_hours: config.jwt_ttl_hours,
        };

        Ok((Self::new(pool, auth, store, evaluation_queue), dispatcher))
    }
}
