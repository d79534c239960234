//! task_core - Core types for the task workflow engine
//!
//! This crate provides the foundational types shared by the client and the
//! workflow crates:
//! - `task` - Task snapshots, statuses and submission receipts
//! - `error` - The error taxonomy (submission, polling, task failure, projection)
//! - `config` - Engine configuration loaded from `taskflow.toml` and the environment

pub mod config;
pub mod error;
pub mod task;

// Re-export commonly used types
pub use config::{PollConfig, TaskflowConfig};
pub use error::{PollingError, ProjectionError, SubmissionError, TaskFailure, TransportError};
pub use task::{Progress, StatusResponse, Submission, TaskSnapshot, TaskStatus};
