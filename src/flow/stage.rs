use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::attempt::{AttemptOutcome, AttemptStatus, LoginAttempt};

/// The four stages of the login bridge.
///
/// Each attempt flows through: DISPATCHED → LOCATED → COMPLETED → AUTHENTICATED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Dispatched,
    Located,
    Completed,
    Authenticated,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Dispatched => write!(f, "DISPATCHED"),
            Stage::Located => write!(f, "LOCATED"),
            Stage::Completed => write!(f, "COMPLETED"),
            Stage::Authenticated => write!(f, "AUTHENTICATED"),
        }
    }
}

/// The result of evaluating a stage transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Advance to the next stage.
    Next(Stage),
    /// The attempt has terminated (authenticated or failed).
    Complete(AttemptOutcome),
}

/// Drives a `LoginAttempt` through the stages.
pub struct LoginMachine;

impl LoginMachine {
    /// Compute the next transition for the attempt based on its current
    /// stage and the outcome of the work done there.
    ///
    /// Success advances toward `Authenticated`; any failure is terminal.
    /// Retries live inside the two polling loops of the flow, never at the
    /// stage level, so a stage failure always completes the attempt.
    pub fn next(attempt: &mut LoginAttempt, outcome: AttemptOutcome) -> Transition {
        let transition = match attempt.stage {
            Stage::Dispatched => match &outcome {
                AttemptOutcome::Success => Transition::Next(Stage::Located),
                AttemptOutcome::Failure(kind) => {
                    Transition::Complete(AttemptOutcome::Failure(kind.clone()))
                }
            },
            Stage::Located => match &outcome {
                AttemptOutcome::Success => Transition::Next(Stage::Completed),
                AttemptOutcome::Failure(kind) => {
                    Transition::Complete(AttemptOutcome::Failure(kind.clone()))
                }
            },
            Stage::Completed => match &outcome {
                AttemptOutcome::Success => Transition::Next(Stage::Authenticated),
                AttemptOutcome::Failure(kind) => {
                    Transition::Complete(AttemptOutcome::Failure(kind.clone()))
                }
            },
            Stage::Authenticated => Transition::Complete(AttemptOutcome::Success),
        };

        // Apply the transition to the attempt.
        match &transition {
            Transition::Next(next_stage) => {
                attempt.stage_history.push(attempt.stage);
                attempt.stage = *next_stage;
                if *next_stage == Stage::Authenticated {
                    attempt.status = AttemptStatus::Authenticated;
                }
            }
            Transition::Complete(outcome) => {
                attempt.stage_history.push(attempt.stage);
                attempt.status = match outcome {
                    AttemptOutcome::Success => AttemptStatus::Authenticated,
                    AttemptOutcome::Failure(_) => AttemptStatus::Failed,
                };
            }
        }
        attempt.updated_at = Utc::now();

        transition
    }
}
