//! Per-session submission throttle: a session cap and a cooldown between
//! accepted submissions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    pub session_limit: u32,
    pub cooldown_secs: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            session_limit: 3,
            cooldown_secs: 300,
        }
    }
}

/// Counters for one user session. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub validation_count: u32,
    pub last_request_time: Option<u64>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submission(&mut self, now: u64) {
        self.validation_count += 1;
        self.last_request_time = Some(now);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    SessionLimitReached { limit: u32 },
    CoolingDown { remaining_secs: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleRejection {
    pub reason: RejectionReason,
}

impl ThrottleRejection {
    /// Remaining wait in seconds, or `None` when only a reset helps.
    pub fn remaining_secs(&self) -> Option<u64> {
        match self.reason {
            RejectionReason::CoolingDown { remaining_secs } => Some(remaining_secs),
            RejectionReason::SessionLimitReached { .. } => None,
        }
    }

    pub fn user_message(&self) -> String {
        match self.reason {
            RejectionReason::SessionLimitReached { limit } => format!(
                "Session limit reached ({} validations). Reset the session to continue.",
                limit
            ),
            RejectionReason::CoolingDown { remaining_secs } => format!(
                "Please wait {}m {:02}s before the next validation.",
                remaining_secs / 60,
                remaining_secs % 60
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionDecision {
    Accepted,
    Rejected(ThrottleRejection),
}

/// Decides whether a new submission may run. The session cap is checked
/// before the cooldown.
pub fn check_submission(state: &SessionState, config: &ThrottleConfig, now: u64) -> SubmissionDecision {
    if state.validation_count >= config.session_limit {
        return SubmissionDecision::Rejected(ThrottleRejection {
            reason: RejectionReason::SessionLimitReached {
                limit: config.session_limit,
            },
        });
    }

    if let Some(last) = state.last_request_time {
        let elapsed = now.saturating_sub(last);
        if elapsed < config.cooldown_secs {
            return SubmissionDecision::Rejected(ThrottleRejection {
                reason: RejectionReason::CoolingDown {
                    remaining_secs: config.cooldown_secs - elapsed,
                },
            });
        }
    }

    SubmissionDecision::Accepted
}
