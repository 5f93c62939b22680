use crate::rate_limit::Admission;
use serde::{Deserialize, Serialize};
use sift_core::{SiftError, SiftResult};
use tracing::warn;

/// What to do when the rate-limit backend cannot answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Reject the request with [`SiftError::StoreUnavailable`].
    #[default]
    FailClosed,
    /// Admit the request and log the outage. Must be opted into explicitly.
    FailOpen,
}

impl FailurePolicy {
    /// Turn a limiter result into an admission decision under this policy.
    pub fn resolve(self, identity: &str, result: SiftResult<Admission>) -> SiftResult<Admission> {
        match result {
            Ok(admission) => Ok(admission),
            Err(e) => match self {
                Self::FailClosed => {
                    warn!(identity, error = %e, "Rate limiter unavailable, denying request");
                    Err(SiftError::StoreUnavailable(format!("rate limiter: {e}")))
                }
                Self::FailOpen => {
                    warn!(identity, error = %e, "Rate limiter unavailable, admitting request");
                    Ok(Admission::Allowed { remaining: 0 })
                }
            },
        }
    }
}
