pub mod question;
pub mod test_session;
pub mod user;
pub mod user_response;
