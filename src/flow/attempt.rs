use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stage::Stage;

/// Distinguishes authentication failures from infrastructure failures.
/// Neither is retried at the stage level; the split matters for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The remote side rejected the attempt (dispatch refused, run concluded
    /// with failure, token missing from logs, profile rejected).
    Auth(String),
    /// Infrastructure failed (network error, polling exhausted, timeout).
    System(String),
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Auth(msg) => write!(f, "Auth failure: {msg}"),
            FailureKind::System(msg) => write!(f, "System failure: {msg}"),
        }
    }
}

/// The result of executing a login stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    Success,
    Failure(FailureKind),
}

/// Tracks the lifecycle status of a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptStatus {
    Pending,
    InProgress,
    Authenticated,
    Failed,
}

/// Tuning for the bounded polling search that locates the workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Maximum number of listing passes before giving up.
    pub max_attempts: u32,
    /// Delay in milliseconds between passes.
    pub interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 12,
            interval_ms: 2000,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Tuning for the completion wait on the located run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Delay in milliseconds between job polls.
    pub interval_ms: u64,
    /// Ceiling in milliseconds on the whole wait.
    pub timeout_ms: u64,
    /// Settle delay after completion so log artifacts become available.
    pub settle_ms: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            timeout_ms: 120_000,
            settle_ms: 1000,
        }
    }
}

impl CompletionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// A single login attempt moving through the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAttempt {
    /// Correlation uid linking this attempt to one remote workflow run.
    pub uid: String,
    pub status: AttemptStatus,
    pub stage: Stage,
    pub stage_history: Vec<Stage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoginAttempt {
    pub fn new(uid: String) -> Self {
        let now = Utc::now();
        Self {
            uid,
            status: AttemptStatus::Pending,
            stage: Stage::Dispatched,
            stage_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Random correlation uid: 32 lowercase hex characters, one per attempt.
pub fn new_uid() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Structured audit record produced when an attempt terminates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAudit {
    pub uid: String,
    pub status: AttemptStatus,
    pub stage_transitions: Vec<Stage>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl LoginAudit {
    /// Generate an audit record from a terminated attempt.
    pub fn from_attempt(attempt: &LoginAttempt) -> Self {
        let now = Utc::now();
        let duration = now - attempt.created_at;
        let mut transitions = attempt.stage_history.clone();
        transitions.push(attempt.stage);

        Self {
            uid: attempt.uid.clone(),
            status: attempt.status,
            stage_transitions: transitions,
            started_at: attempt.created_at,
            completed_at: now,
            duration_ms: duration.num_milliseconds(),
        }
    }
}
