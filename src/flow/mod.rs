mod attempt;
mod stage;

pub use attempt::{
    AttemptOutcome, AttemptStatus, CompletionConfig, FailureKind, LoginAttempt, LoginAudit,
    PollConfig, new_uid,
};
pub use stage::{LoginMachine, Stage, Transition};
