//! Collaborators shared by every pair cycle.

use crate::feed::DataFeed;
use crate::health::HealthMonitor;
use crate::metrics::Metrics;
use crate::notify::NotificationDispatcher;
use crate::store::PriceSeriesStore;
use std::sync::Arc;

/// Injected into the scheduler. Everything here is shared read-only or
/// internally partitioned by pair.
#[derive(Clone)]
pub struct PipelineContext {
    pub feed: Arc<dyn DataFeed>,
    pub store: Arc<PriceSeriesStore>,
    pub health: Arc<HealthMonitor>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub metrics: Option<Arc<Metrics>>,
}

impl PipelineContext {
    pub fn new(
        feed: Arc<dyn DataFeed>,
        store: Arc<PriceSeriesStore>,
        health: Arc<HealthMonitor>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            feed,
            store,
            health,
            dispatcher,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}
