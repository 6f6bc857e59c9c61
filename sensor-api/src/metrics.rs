use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref READINGS_CREATED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "sensor_api_readings_created_total",
        "Total readings stored through the API, sample generator or seeder"
    ))
    .expect("valid metric options");
    pub static ref READINGS_DELETED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "sensor_api_readings_deleted_total",
        "Total readings deleted"
    ))
    .expect("valid metric options");
    pub static ref LOGINS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "sensor_api_logins_total",
        "Total tokens issued"
    ))
    .expect("valid metric options");
    pub static ref TOKENS_REJECTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "sensor_api_tokens_rejected_total",
            "Bearer tokens rejected, by reason"
        ),
        &["reason"]
    )
    .expect("valid metric options");
    pub static ref DB_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "sensor_api_db_failures_total",
        "Total database insert failures"
    ))
    .expect("valid metric options");
    pub static ref REQUEST_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "sensor_api_request_latency_seconds",
            "Time taken to serve an API request"
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0
        ])
    )
    .expect("valid metric options");
}

pub fn init_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(READINGS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(READINGS_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(LOGINS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TOKENS_REJECTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DB_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEST_LATENCY_SECONDS.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
