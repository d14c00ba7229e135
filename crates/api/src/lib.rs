//! Taskmail HTTP API.
//!
//! Task create/update with inline email outcome, the admin email status
//! endpoint and the queue monitoring endpoints.

pub mod middleware;
pub mod routes;
pub mod state;
