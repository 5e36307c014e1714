pub mod client;
pub mod error;
pub mod types;

pub use client::GitHubClient;
pub use error::GitHubError;
pub use types::{JobStep, RunJob, UserProfile, WorkflowRun};
