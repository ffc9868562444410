use crate::error::DeliveryError;
use crate::models::Signal;
use crate::notify::{Messenger, UserStore};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Which signals are worth sending.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispatchPolicy {
    pub min_strength: f64,
    pub dispatch_neutral: bool,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            min_strength: 0.0,
            dispatch_neutral: false,
        }
    }
}

impl DispatchPolicy {
    pub fn admits(&self, signal: &Signal) -> bool {
        if !signal.is_actionable() && !self.dispatch_neutral {
            return false;
        }
        signal.strength >= self.min_strength
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub filtered: bool,
    pub attempted: usize,
    pub delivered: usize,
    pub failures: Vec<DeliveryError>,
}

/// Fans a signal out to every subscriber of its pair, one attempt each.
pub struct NotificationDispatcher {
    users: Arc<dyn UserStore>,
    messenger: Arc<dyn Messenger>,
    policy: DispatchPolicy,
}

impl NotificationDispatcher {
    pub fn new(
        users: Arc<dyn UserStore>,
        messenger: Arc<dyn Messenger>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            users,
            messenger,
            policy,
        }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    pub async fn dispatch(&self, signal: &Signal) -> DispatchReport {
        if !self.policy.admits(signal) {
            debug!(
                pair_id = %signal.pair_id,
                direction = %signal.direction,
                strength = signal.strength,
                "Dispatcher: signal below dispatch policy, not sent"
            );
            return DispatchReport {
                filtered: true,
                ..DispatchReport::default()
            };
        }

        let subscribers = self.users.subscribers(&signal.pair_id).await;
        let results = join_all(
            subscribers
                .iter()
                .map(|subscriber| self.messenger.deliver(subscriber, signal)),
        )
        .await;

        let mut report = DispatchReport {
            attempted: subscribers.len(),
            ..DispatchReport::default()
        };
        for result in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(pair_id = %signal.pair_id, error = %e, "Dispatcher: delivery failed");
                    report.failures.push(e);
                }
            }
        }
        report
    }
}
