//! Job lifecycle state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, ValidationError};

/// Status of a queued processing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for `scheduled_at` and a free worker.
    Pending,

    /// Claimed by exactly one worker.
    Processing,

    Completed,

    /// Attempts exhausted or cancelled. Only an operator requeue leaves this state.
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl StateMachine for JobStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use JobStatus::*;
        matches!(
            (self, target),
            (Pending, Processing)
                | (Pending, Failed) // cancel
                | (Processing, Completed)
                | (Processing, Pending) // retry after backoff
                | (Processing, Failed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use JobStatus::*;
        match self {
            Pending => vec![Processing, Failed],
            Processing => vec![Completed, Pending, Failed],
            Completed => vec![],
            Failed => vec![],
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError::invalid_format("job_status", format!("unknown status '{}'", s)))
    }
}
