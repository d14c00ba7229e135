pub mod issue_token;
pub mod queue_emails;
