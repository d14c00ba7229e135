pub mod auth;
pub mod email_warning;
