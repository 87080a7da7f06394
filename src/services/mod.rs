pub mod ai_service;
pub mod eval_service;
pub mod grading_service;
pub mod queue_service;
pub mod session_service;
pub mod test_service;
pub mod user_service;
