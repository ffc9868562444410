//! Environment-driven configuration.
//!
//! Values come from process environment (optionally seeded from `.env` by
//! the binary). Every key has a default; malformed or inconsistent values
//! are reported as [`ConfigError`].

use crate::error::ConfigError;
use crate::health::HealthConfig;
use crate::indicators::IndicatorParams;
use crate::notify::DispatchPolicy;
use crate::signals::SignalThresholds;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PAIRS: &[&str] = &[
    "EUR/USD", "GBP/USD", "USD/JPY", "USD/CHF", "AUD/USD", "USD/CAD", "NZD/USD", "EUR/GBP",
    "EUR/JPY", "GBP/JPY", "EUR/CHF", "AUD/JPY", "EUR/AUD", "EUR/CAD", "GBP/CHF", "CAD/JPY",
    "AUD/CAD", "AUD/NZD", "CHF/JPY", "EUR/NZD", "GBP/AUD", "GBP/CAD", "NZD/JPY", "AUD/CHF",
    "CAD/CHF", "GBP/NZD", "NZD/CAD", "NZD/CHF", "USD/SGD", "USD/NOK", "USD/SEK", "USD/MXN",
];

/// Trailing lookbacks, in bars, each signal is also evaluated over.
pub const DEFAULT_TIMEFRAMES: &[usize] = &[1, 5, 15, 30];

/// Get the runtime environment name (`sandbox` unless `ENVIRONMENT` is set).
pub fn get_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub pairs: Vec<String>,
    pub interval: Duration,
    pub max_concurrency: usize,
    pub feed_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pairs: DEFAULT_PAIRS.iter().map(|p| p.to_string()).collect(),
            interval: Duration::from_secs(60),
            max_concurrency: 8,
            feed_timeout: Duration::from_millis(10_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub environment: String,
    pub http_port: u16,
    pub scheduler: SchedulerConfig,
    pub indicators: IndicatorParams,
    pub warmup_margin: usize,
    pub thresholds: SignalThresholds,
    pub timeframes: Vec<usize>,
    pub dispatch: DispatchPolicy,
    pub health: HealthConfig,
    pub watchdog_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "sandbox".to_string(),
            http_port: 8080,
            scheduler: SchedulerConfig::default(),
            indicators: IndicatorParams::default(),
            warmup_margin: 50,
            thresholds: SignalThresholds::default(),
            timeframes: DEFAULT_TIMEFRAMES.to_vec(),
            dispatch: DispatchPolicy::default(),
            health: HealthConfig::default(),
            watchdog_interval: Duration::from_secs(30),
        }
    }
}

struct Source<F> {
    lookup: F,
}

impl<F> Source<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.raw(key) {
            None => Ok(default),
            Some(value) => value.parse::<T>().map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn list<T>(&self, key: &str, default: Vec<T>) -> Result<Vec<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let Some(value) = self.raw(key) else {
            return Ok(default);
        };
        value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| {
                item.parse::<T>().map_err(|e: T::Err| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.clone(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    fn optional<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.raw(key)
            .map(|value| {
                value.parse::<T>().map_err(|e: T::Err| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.clone(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let src = Source { lookup };
        let d = AppConfig::default();

        let pairs = match src.raw("PAIRS") {
            Some(list) => list
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            None => d.scheduler.pairs.clone(),
        };

        let scheduler = SchedulerConfig {
            pairs,
            interval: Duration::from_secs(
                src.parse("EVAL_INTERVAL_SECONDS", d.scheduler.interval.as_secs())?,
            ),
            max_concurrency: src.parse("MAX_CONCURRENT_CYCLES", d.scheduler.max_concurrency)?,
            feed_timeout: Duration::from_millis(
                src.parse("FEED_TIMEOUT_MS", d.scheduler.feed_timeout.as_millis() as u64)?,
            ),
        };

        let di = d.indicators;
        let indicators = IndicatorParams {
            rsi_period: src.parse("RSI_PERIOD", di.rsi_period)?,
            ema_short_period: src.parse("EMA_SHORT_PERIOD", di.ema_short_period)?,
            ema_long_period: src.parse("EMA_LONG_PERIOD", di.ema_long_period)?,
            macd_fast: src.parse("MACD_FAST", di.macd_fast)?,
            macd_slow: src.parse("MACD_SLOW", di.macd_slow)?,
            macd_signal: src.parse("MACD_SIGNAL", di.macd_signal)?,
            bollinger_period: src.parse("BOLLINGER_PERIOD", di.bollinger_period)?,
            bollinger_k: src.parse("BOLLINGER_K", di.bollinger_k)?,
        };

        let thresholds = SignalThresholds {
            rsi_oversold: src.parse("RSI_OVERSOLD", d.thresholds.rsi_oversold)?,
            rsi_overbought: src.parse("RSI_OVERBOUGHT", d.thresholds.rsi_overbought)?,
            bollinger_touch_inclusive: src.parse(
                "BOLLINGER_TOUCH_INCLUSIVE",
                d.thresholds.bollinger_touch_inclusive,
            )?,
            ema_trend_threshold_pct: src.optional("EMA_TREND_THRESHOLD_PCT")?,
        };

        let dispatch = DispatchPolicy {
            min_strength: src.parse("MIN_DISPATCH_STRENGTH", d.dispatch.min_strength)?,
            dispatch_neutral: src.parse("DISPATCH_NEUTRAL", d.dispatch.dispatch_neutral)?,
        };

        let health = HealthConfig {
            failure_threshold: src.parse("FAILURE_THRESHOLD", d.health.failure_threshold)?,
            backoff_base: Duration::from_secs(
                src.parse("BACKOFF_BASE_SECONDS", d.health.backoff_base.as_secs())?,
            ),
            backoff_cap: Duration::from_secs(
                src.parse("BACKOFF_CAP_SECONDS", d.health.backoff_cap.as_secs())?,
            ),
            low_liveness_threshold: src
                .parse("LOW_LIVENESS_THRESHOLD", d.health.low_liveness_threshold)?,
        };

        let config = AppConfig {
            environment: src.raw("ENVIRONMENT").unwrap_or(d.environment),
            http_port: src.parse("HTTP_PORT", d.http_port)?,
            scheduler,
            indicators,
            warmup_margin: src.parse("WARMUP_MARGIN", d.warmup_margin)?,
            thresholds,
            timeframes: src.list("SIGNAL_TIMEFRAMES", d.timeframes)?,
            dispatch,
            health,
            watchdog_interval: Duration::from_secs(
                src.parse("WATCHDOG_INTERVAL_SECONDS", d.watchdog_interval.as_secs())?,
            ),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.scheduler;
        if s.pairs.is_empty() {
            return Err(ConfigError::Inconsistent("no pairs configured".to_string()));
        }
        if s.interval.is_zero() {
            return Err(ConfigError::Inconsistent(
                "evaluation interval must be > 0".to_string(),
            ));
        }
        if s.max_concurrency == 0 {
            return Err(ConfigError::Inconsistent(
                "max concurrent cycles must be > 0".to_string(),
            ));
        }
        if s.feed_timeout.is_zero() {
            return Err(ConfigError::Inconsistent("feed timeout must be > 0".to_string()));
        }

        let p = &self.indicators;
        let periods = [
            ("RSI_PERIOD", p.rsi_period),
            ("EMA_SHORT_PERIOD", p.ema_short_period),
            ("EMA_LONG_PERIOD", p.ema_long_period),
            ("MACD_FAST", p.macd_fast),
            ("MACD_SLOW", p.macd_slow),
            ("MACD_SIGNAL", p.macd_signal),
            ("BOLLINGER_PERIOD", p.bollinger_period),
        ];
        if let Some((key, _)) = periods.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: "0".to_string(),
                reason: "period must be at least 1".to_string(),
            });
        }
        if p.macd_fast >= p.macd_slow {
            return Err(ConfigError::Inconsistent(format!(
                "MACD fast period {} must be shorter than slow period {}",
                p.macd_fast, p.macd_slow
            )));
        }
        if p.ema_short_period >= p.ema_long_period {
            return Err(ConfigError::Inconsistent(format!(
                "EMA short period {} must be shorter than long period {}",
                p.ema_short_period, p.ema_long_period
            )));
        }
        if !p.bollinger_k.is_finite() || p.bollinger_k <= 0.0 {
            return Err(ConfigError::Inconsistent(format!(
                "Bollinger multiplier must be positive, got {}",
                p.bollinger_k
            )));
        }
        let retention = self.retention();
        if let Some(bad) = self
            .timeframes
            .iter()
            .find(|&&tf| tf == 0 || tf > retention)
        {
            return Err(ConfigError::InvalidValue {
                key: "SIGNAL_TIMEFRAMES".to_string(),
                value: bad.to_string(),
                reason: format!("lookback must lie in [1, {}]", retention),
            });
        }
        if !(0.0..=1.0).contains(&self.dispatch.min_strength) {
            return Err(ConfigError::Inconsistent(format!(
                "minimum dispatch strength {} must lie in [0, 1]",
                self.dispatch.min_strength
            )));
        }

        self.thresholds.validate()?;
        self.health.validate()
    }

    /// Bars retained per pair.
    pub fn retention(&self) -> usize {
        self.indicators.retention(self.warmup_margin)
    }
}
