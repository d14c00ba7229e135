//! Task and user persistence plus the task mutation rules.

pub mod task;
pub mod user;
