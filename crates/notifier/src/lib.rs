//! Task notification pipeline.
//!
//! A task assignment becomes a [`record::NotificationRecord`], which the
//! [`dispatch::DispatchService`] either pushes onto a [`queue::JobQueue`] or
//! delivers inline. Queue workers ([`worker::QueueWorker`]) run the
//! [`executor::DeliveryExecutor`] under the [`policy::RetryPolicy`], and the
//! [`monitor::QueueMonitor`] exposes the queue to administrators.

pub mod cache;
pub mod dispatch;
pub mod executor;
pub mod fallback;
pub mod message;
pub mod monitor;
pub mod policy;
pub mod queue;
pub mod record;
pub mod status;
pub mod transport;
pub mod worker;
