use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Suspended,
}

/// Health of one pair (or one feed). Owned by the health monitor; everyone
/// else reads copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairHealthState {
    pub pair_id: String,
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Utc>>,
    pub status: HealthStatus,
    /// Earliest time a suspended pair may run again.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl PairHealthState {
    pub fn new(pair_id: impl Into<String>) -> Self {
        Self {
            pair_id: pair_id.into(),
            consecutive_failures: 0,
            last_success_at: None,
            status: HealthStatus::Healthy,
            next_retry_at: None,
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.status == HealthStatus::Suspended
    }
}
