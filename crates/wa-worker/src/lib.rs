//! Queue worker (C8): the cooperative loop that drains the durable
//! ingestion queue built by `wa-queue`, resolves each webhook payload to a
//! case via `wa-case`, and schedules response generation.
//!
//! This crate owns the loop and its ambient stack (config, logging,
//! errors). It deliberately has no opinion on what a message means or how
//! a response gets generated — that is the caller-supplied
//! [`wa_case::CaseProcessor`]'s job.

pub mod config;
pub mod error;
pub mod logging;
pub mod worker;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use worker::{run, WorkerDeps};
