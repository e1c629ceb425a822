use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub aggregations_total: IntCounterVec,
    pub aggregation_latency_seconds: Histogram,
    pub store_fetch_failures_total: IntCounterVec,
    pub active_watchers: IntGauge,
    pub status_transitions_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let aggregations_total = IntCounterVec::new(
            Opts::new("aggregations_total", "Status aggregations by outcome"),
            &["outcome"],
        )
        .expect("valid aggregations_total metric");

        let aggregation_latency_seconds = Histogram::with_opts(HistogramOpts::new(
            "aggregation_latency_seconds",
            "Latency of a full status aggregation in seconds",
        ))
        .expect("valid aggregation_latency_seconds metric");

        let store_fetch_failures_total = IntCounterVec::new(
            Opts::new(
                "store_fetch_failures_total",
                "Document store fetches that failed and were treated as empty",
            ),
            &["collection"],
        )
        .expect("valid store_fetch_failures_total metric");

        let active_watchers = IntGauge::new(
            "active_watchers",
            "Live status subscriptions currently running",
        )
        .expect("valid active_watchers metric");

        let status_transitions_total = IntCounterVec::new(
            Opts::new(
                "status_transitions_total",
                "Offer and appointment status writes",
            ),
            &["entity", "status"],
        )
        .expect("valid status_transitions_total metric");

        registry
            .register(Box::new(aggregations_total.clone()))
            .expect("register aggregations_total");
        registry
            .register(Box::new(aggregation_latency_seconds.clone()))
            .expect("register aggregation_latency_seconds");
        registry
            .register(Box::new(store_fetch_failures_total.clone()))
            .expect("register store_fetch_failures_total");
        registry
            .register(Box::new(active_watchers.clone()))
            .expect("register active_watchers");
        registry
            .register(Box::new(status_transitions_total.clone()))
            .expect("register status_transitions_total");

        Self {
            registry,
            aggregations_total,
            aggregation_latency_seconds,
            store_fetch_failures_total,
            active_watchers,
            status_transitions_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
