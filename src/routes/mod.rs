pub mod admin;
pub mod auth;
pub mod health;
pub mod session;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};

use crate::middleware::{
    auth::{require_admin, require_auth},
    rate_limit::{new_rps_state, rps_middleware},
};
use crate::AppState;

/// Public, taking-user and admin routes with their auth and rate limits.
pub fn app_router(state: AppState, public_rps: u32, admin_rps: u32) -> Router {
    let public_api = Router::new()
        .route("/health", get(health::health))
        .route("/login", post(auth::login));

    let user_api = Router::new()
        .route("/start-test/:test_id", post(session::start_test))
        .route("/session/:session_id/question", get(session::current_question))
        .route("/session/:session_id/submit", post(session::submit_answer))
        .route("/session/:session_id/info", get(session::session_info))
        .route("/active-test", get(session::active_test))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let admin_api = Router::new()
        .route("/admin/tests", get(admin::list_tests))
        .route("/admin/active-test", get(admin::active_test))
        .route("/admin/create-test", post(admin::create_test))
        .route("/admin/test/:test_id/activate", post(admin::activate_test))
        .route("/admin/test/:test_id/deactivate", post(admin::deactivate_test))
        .route("/admin/test/:test_id", delete(admin::delete_test))
        .route("/admin/test/:test_id/questions", get(admin::list_questions))
        .route("/admin/test/:test_id/add-question", post(admin::add_question))
        .route("/admin/question/:question_id", delete(admin::delete_question))
        .route("/admin/test/:test_id/results", get(admin::test_results))
        .route("/admin/check/:user_id", get(admin::check_admin))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/report/:session_id", get(admin::session_report))
        .route("/admin/evaluate/:session_id", post(admin::start_evaluation))
        .route_layer(from_fn_with_state(state.clone(), require_admin))
        .layer(from_fn_with_state(new_rps_state(admin_rps), rps_middleware));

    Router::new()
        .merge(public_api.merge(user_api).layer(from_fn_with_state(
            new_rps_state(public_rps),
            rps_middleware,
        )))
        .merge(admin_api)
        .with_state(state)
}
