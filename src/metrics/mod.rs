//! Prometheus metrics for the pipeline and the monitoring surface.

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,

    pub pair_cycles_total: IntCounter,
    pub pair_cycle_failures_total: IntCounter,
    pub pair_cycles_skipped_total: IntCounter,
    pub pair_cycle_duration_seconds: Histogram,
    pub signals_generated_total: IntCounter,
    pub signals_dispatched_total: IntCounter,
    pub delivery_failures_total: IntCounter,
    pub rejected_bars_total: IntCounter,

    pub pairs_healthy: IntGauge,
    pub pairs_suspended: IntGauge,
    pub liveness_ratio: Gauge,

    pub http_requests_total: IntCounter,
    pub http_requests_in_flight: IntGauge,
    pub http_request_duration_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let pair_cycles_total =
            IntCounter::with_opts(Opts::new("pair_cycles_total", "Pair cycles started"))?;
        let pair_cycle_failures_total = IntCounter::with_opts(Opts::new(
            "pair_cycle_failures_total",
            "Pair cycles that ended in a feed or config failure",
        ))?;
        let pair_cycles_skipped_total = IntCounter::with_opts(Opts::new(
            "pair_cycles_skipped_total",
            "Pair cycles skipped (suspended in backoff or still in flight)",
        ))?;
        let pair_cycle_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("pair_cycle_duration_seconds", "Duration of one pair cycle")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        let signals_generated_total = IntCounter::with_opts(Opts::new(
            "signals_generated_total",
            "Signals produced by the aggregator",
        ))?;
        let signals_dispatched_total = IntCounter::with_opts(Opts::new(
            "signals_dispatched_total",
            "Signals handed to the messaging collaborator",
        ))?;
        let delivery_failures_total = IntCounter::with_opts(Opts::new(
            "delivery_failures_total",
            "Failed deliveries to individual subscribers",
        ))?;
        let rejected_bars_total = IntCounter::with_opts(Opts::new(
            "rejected_bars_total",
            "Bars rejected by the price series store",
        ))?;
        let pairs_healthy = IntGauge::with_opts(Opts::new("pairs_healthy", "Pairs in HEALTHY"))?;
        let pairs_suspended =
            IntGauge::with_opts(Opts::new("pairs_suspended", "Pairs in SUSPENDED"))?;
        let liveness_ratio =
            Gauge::with_opts(Opts::new("liveness_ratio", "Fraction of pairs HEALTHY"))?;
        let http_requests_total =
            IntCounter::with_opts(Opts::new("http_requests_total", "HTTP requests served"))?;
        let http_requests_in_flight = IntGauge::with_opts(Opts::new(
            "http_requests_in_flight",
            "HTTP requests currently being served",
        ))?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency",
        ))?;

        registry.register(Box::new(pair_cycles_total.clone()))?;
        registry.register(Box::new(pair_cycle_failures_total.clone()))?;
        registry.register(Box::new(pair_cycles_skipped_total.clone()))?;
        registry.register(Box::new(pair_cycle_duration_seconds.clone()))?;
        registry.register(Box::new(signals_generated_total.clone()))?;
        registry.register(Box::new(signals_dispatched_total.clone()))?;
        registry.register(Box::new(delivery_failures_total.clone()))?;
        registry.register(Box::new(rejected_bars_total.clone()))?;
        registry.register(Box::new(pairs_healthy.clone()))?;
        registry.register(Box::new(pairs_suspended.clone()))?;
        registry.register(Box::new(liveness_ratio.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            pair_cycles_total,
            pair_cycle_failures_total,
            pair_cycles_skipped_total,
            pair_cycle_duration_seconds,
            signals_generated_total,
            signals_dispatched_total,
            delivery_failures_total,
            rejected_bars_total,
            pairs_healthy,
            pairs_suspended,
            liveness_ratio,
            http_requests_total,
            http_requests_in_flight,
            http_request_duration_seconds,
        })
    }

    /// Text exposition of everything registered.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
