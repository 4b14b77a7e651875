use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Global metrics instance.
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Metrics collector for the marketplace engine.
#[derive(Debug, Clone)]
pub struct Metrics {
    initialized: bool,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self { initialized: true }
    }

    pub fn record_wallet_movement(&self, operation: &str, tx_type: &str) {
        counter!("marketplace_wallet_movements_total", "operation" => operation.to_string(), "type" => tx_type.to_string()).increment(1);
    }

    pub fn record_booking_created(&self) {
        counter!("marketplace_bookings_created_total").increment(1);
    }

    pub fn record_booking_transition(&self, status: &str) {
        counter!("marketplace_booking_transitions_total", "status" => status.to_string()).increment(1);
    }

    pub fn record_chat_created(&self) {
        counter!("marketplace_chats_created_total").increment(1);
    }

    pub fn record_chat_message(&self) {
        counter!("marketplace_chat_messages_total").increment(1);
    }

    pub fn record_review_written(&self) {
        counter!("marketplace_reviews_written_total").increment(1);
    }

    pub fn record_withdrawal(&self) {
        counter!("marketplace_withdrawals_total").increment(1);
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_ms: f64) {
        counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string(), "status" => status.to_string()).increment(1);
        histogram!("http_request_duration_ms", "method" => method.to_string(), "path" => path.to_string()).record(duration_ms);
    }
}

/// Timer for measuring operation latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for LatencyTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Initializes the metrics system and returns the Prometheus handle.
pub fn init_metrics() -> PrometheusHandle {
    let handle = METRICS_HANDLE.get_or_init(|| {
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .expect("Failed to install Prometheus recorder");

        describe_metrics();
        handle
    });

    METRICS.get_or_init(Metrics::new);

    handle.clone()
}

fn describe_metrics() {
    describe_counter!("marketplace_wallet_movements_total", Unit::Count, "Total wallet balance movements");
    describe_counter!("marketplace_bookings_created_total", Unit::Count, "Total bookings created");
    describe_counter!("marketplace_booking_transitions_total", Unit::Count, "Total booking status transitions");
    describe_counter!("marketplace_chats_created_total", Unit::Count, "Total chats created");
    describe_counter!("marketplace_chat_messages_total", Unit::Count, "Total chat messages sent");
    describe_counter!("marketplace_reviews_written_total", Unit::Count, "Total reviews written");
    describe_counter!("marketplace_withdrawals_total", Unit::Count, "Total withdrawals completed");

    describe_counter!("http_requests_total", Unit::Count, "Total HTTP requests");
    describe_histogram!("http_request_duration_ms", Unit::Milliseconds, "HTTP request latency in milliseconds");
}

/// Returns the global metrics instance.
pub fn get_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}
