//! Signal-generation pipeline for currency pairs.
//!
//! Price bars flow from a [`feed::DataFeed`] into the per-pair
//! [`store::PriceSeriesStore`], through the indicator engine and the vote
//! aggregator, and out to the [`notify::NotificationDispatcher`]. The
//! [`health::HealthMonitor`] records every stage and drives backoff for
//! failing pairs.

pub mod common;
pub mod config;
pub mod core;
pub mod error;
pub mod feed;
pub mod health;
pub mod indicators;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod notify;
pub mod signals;
pub mod store;
