//! Hand-off of finalized signals to the messaging collaborator.

pub mod dispatcher;
pub mod sandbox;

pub use dispatcher::{DispatchPolicy, DispatchReport, NotificationDispatcher};
pub use sandbox::{LogMessenger, PlainFormatter, StaticUserStore};

use crate::error::DeliveryError;
use crate::models::Signal;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub user_id: String,
    pub locale: String,
}

impl Subscriber {
    pub fn new(user_id: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            locale: locale.into(),
        }
    }
}

/// Read-only lookup of who is subscribed to a pair.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn subscribers(&self, pair_id: &str) -> Vec<Subscriber>;
}

/// Messaging transport. One call per subscriber per cycle.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn deliver(
        &self,
        subscriber: &Subscriber,
        signal: &Signal,
    ) -> Result<(), DeliveryError>;
}

/// `Signal × Locale -> text`, owned by the messaging side.
pub trait SignalFormatter: Send + Sync {
    fn render(&self, signal: &Signal, locale: &str) -> String;
}
