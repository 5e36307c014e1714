use thiserror::Error;

use crate::github::GitHubError;

/// Failures of the workflow-relayed login bridge.
///
/// Every stage error propagates unchanged to the top-level command; none
/// of these is retried automatically outside the two polling loops.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("workflow dispatch rejected: {0}")]
    Dispatch(String),

    #[error("no workflow run matched uid {uid} after {attempts} attempts")]
    RunNotFound { uid: String, attempts: u32 },

    #[error("{count} workflow runs matched uid {uid}; refusing to guess")]
    AmbiguousRun { uid: String, count: usize },

    #[error("job {job} did not complete within {waited_ms}ms")]
    JobTimeout { job: String, waited_ms: u64 },

    #[error("workflow run concluded with {conclusion} instead of success")]
    WorkflowFailed { conclusion: String },

    #[error("log entry {entry} not found in run archive")]
    LogFileNotFound { entry: String },

    #[error("log archive unreadable: {0}")]
    LogArchive(String),

    #[error("no token fragment found in run logs")]
    TokenExtractionFailed,

    #[error("profile fetch rejected: {0}")]
    ProfileFetch(#[source] GitHubError),

    #[error("another login attempt is already in flight")]
    LoginInProgress,

    #[error("login cancelled")]
    Cancelled,

    #[error("GitHub API error: {0}")]
    Api(#[from] GitHubError),
}

#[derive(Debug, Error)]
pub enum PapergateError {
    #[error("Config error: {0}")]
    Config(String),

    /// One generic user-visible message; the stage detail stays in the
    /// source chain for verbose output.
    #[error("Authentication failed. Please try again.")]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
