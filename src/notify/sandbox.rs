//! Collaborators used when no real messaging front-end is wired in.

use crate::error::DeliveryError;
use crate::models::{Signal, SignalDirection};
use crate::notify::{Messenger, SignalFormatter, Subscriber, UserStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Fixed subscriber list, either per pair or for every pair.
#[derive(Debug, Clone, Default)]
pub struct StaticUserStore {
    all_pairs: Vec<Subscriber>,
    by_pair: HashMap<String, Vec<Subscriber>>,
}

impl StaticUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_all(mut self, subscriber: Subscriber) -> Self {
        self.all_pairs.push(subscriber);
        self
    }

    pub fn subscribe(mut self, pair_id: impl Into<String>, subscriber: Subscriber) -> Self {
        self.by_pair.entry(pair_id.into()).or_default().push(subscriber);
        self
    }
}

#[async_trait]
impl UserStore for StaticUserStore {
    async fn subscribers(&self, pair_id: &str) -> Vec<Subscriber> {
        let mut out = self.all_pairs.clone();
        if let Some(specific) = self.by_pair.get(pair_id) {
            out.extend(specific.iter().cloned());
        }
        out
    }
}

/// Minimal English/Russian rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFormatter;

impl SignalFormatter for PlainFormatter {
    fn render(&self, signal: &Signal, locale: &str) -> String {
        let indicators: Vec<&str> = signal
            .triggering_indicators
            .iter()
            .map(|i| i.as_str())
            .collect();
        let strength = (signal.strength * 100.0).round();
        match locale {
            "ru" => {
                let direction = match signal.direction {
                    SignalDirection::Buy => "ПОКУПКА",
                    SignalDirection::Sell => "ПРОДАЖА",
                    SignalDirection::Neutral => "НЕЙТРАЛЬНО",
                };
                format!(
                    "{}: {} ({}%) по цене {:.5}, {:+.2}% [{}]{}",
                    signal.pair_id,
                    direction,
                    strength,
                    signal.price,
                    signal.price_change,
                    indicators.join(", "),
                    timeframe_lines(signal)
                )
            }
            _ => format!(
                "{}: {} ({}%) at {:.5}, {:+.2}% [{}]{}",
                signal.pair_id,
                signal.direction,
                strength,
                signal.price,
                signal.price_change,
                indicators.join(", "),
                timeframe_lines(signal)
            ),
        }
    }
}

fn timeframe_lines(signal: &Signal) -> String {
    signal
        .timeframes
        .iter()
        .map(|tf| format!("\n  {}: {} {:+.2}%", tf.lookback, tf.direction, tf.price_change))
        .collect()
}

/// Writes rendered signals to the log instead of a chat transport.
pub struct LogMessenger {
    formatter: Arc<dyn SignalFormatter>,
}

impl LogMessenger {
    pub fn new(formatter: Arc<dyn SignalFormatter>) -> Self {
        Self { formatter }
    }
}

impl Default for LogMessenger {
    fn default() -> Self {
        Self::new(Arc::new(PlainFormatter))
    }
}

#[async_trait]
impl Messenger for LogMessenger {
    async fn deliver(&self, subscriber: &Subscriber, signal: &Signal) -> Result<(), DeliveryError> {
        let text = self.formatter.render(signal, &subscriber.locale);
        info!(user_id = %subscriber.user_id, locale = %subscriber.locale, "{}", text);
        Ok(())
    }
}
