//! hirefire-worker: job queue metrics for HireFire worker dynos.
//!
//! A [`Worker`] pairs a Procfile process name with an async callable that
//! measures that process's job queue. The middleware evaluates every
//! registered worker when the HireFire info endpoint is requested.
//!
//! The [`bullmq`] module provides ready-made callables for queues managed by
//! BullMQ on Redis.

pub mod bullmq;
pub mod error;
pub mod worker;

pub use bullmq::BullMqOptions;
pub use error::{MacroError, WorkerError};
pub use worker::{MetricFuture, Worker};
