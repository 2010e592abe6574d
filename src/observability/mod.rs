//! Observability: OpenTelemetry metrics for the auth, quota, messaging,
//! swipe, payment, and dispatcher components.

use opentelemetry::metrics::{Counter, Histogram, Meter, MeterProvider};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use std::sync::OnceLock;
use std::time::Instant;

static METRICS: OnceLock<Metrics> = OnceLock::new();

pub struct Metrics {
    pub requests_total: Counter<u64>,
    pub rate_limit_blocks: Counter<u64>,
    pub quota_denials: Counter<u64>,
    pub auth_successes: Counter<u64>,
    pub auth_failures: Counter<u64>,
    pub refresh_token_replays: Counter<u64>,
    pub swipes_recorded: Counter<u64>,
    pub chats_created: Counter<u64>,
    pub chats_transitioned: Counter<u64>,
    pub messages_sent: Counter<u64>,
    pub payment_orders_created: Counter<u64>,
    pub payment_orders_confirmed: Counter<u64>,
    pub dispatcher_intents: Counter<u64>,
    pub classifier_latency_seconds: Histogram<f64>,
}

impl Metrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            requests_total: meter.u64_counter("matchcore_requests_total").build(),
            rate_limit_blocks: meter.u64_counter("matchcore_rate_limit_blocks_total").build(),
            quota_denials: meter.u64_counter("matchcore_quota_denials_total").build(),
            auth_successes: meter.u64_counter("matchcore_auth_successes_total").build(),
            auth_failures: meter.u64_counter("matchcore_auth_failures_total").build(),
            refresh_token_replays: meter.u64_counter("matchcore_refresh_token_replays_total").build(),
            swipes_recorded: meter.u64_counter("matchcore_swipes_total").build(),
            chats_created: meter.u64_counter("matchcore_chats_created_total").build(),
            chats_transitioned: meter.u64_counter("matchcore_chats_transitioned_total").build(),
            messages_sent: meter.u64_counter("matchcore_messages_sent_total").build(),
            payment_orders_created: meter.u64_counter("matchcore_payment_orders_created_total").build(),
            payment_orders_confirmed: meter.u64_counter("matchcore_payment_orders_confirmed_total").build(),
            dispatcher_intents: meter.u64_counter("matchcore_dispatcher_intents_total").build(),
            classifier_latency_seconds: meter
                .f64_histogram("matchcore_classifier_latency_seconds")
                .with_unit("s")
                .build(),
        }
    }

    pub fn record_request(&self, route: &str, status: u16) {
        self.requests_total.add(
            1,
            &[KeyValue::new("route", route.to_string()), KeyValue::new("status", status as i64)],
        );
    }

    pub fn record_dispatcher_intent(&self, intent: &str, latency_seconds: f64) {
        self.dispatcher_intents.add(1, &[KeyValue::new("intent", intent.to_string())]);
        self.classifier_latency_seconds.record(latency_seconds, &[]);
    }
}

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
}

pub fn init(config: ObservabilityConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let meter_provider = if let Some(endpoint) = &config.otlp_endpoint {
        use opentelemetry_otlp::WithExportConfig;
        use opentelemetry_sdk::metrics::PeriodicReader;
        use opentelemetry_sdk::runtime;

        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()?;

        let reader = PeriodicReader::builder(exporter, runtime::Tokio)
            .with_interval(std::time::Duration::from_secs(30))
            .build();

        SdkMeterProvider::builder().with_reader(reader).build()
    } else {
        tracing::info!("OTEL_EXPORTER_OTLP_ENDPOINT not set, metrics collected in-process only");
        SdkMeterProvider::builder().build()
    };

    let meter = meter_provider.meter("matchcore");
    let metrics = Metrics::new(&meter);

    METRICS.set(metrics).map_err(|_| "metrics already initialized")?;

    tracing::info!(otlp_endpoint = ?config.otlp_endpoint, service = %config.service_name, "observability initialized");
    Ok(())
}

pub fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

/// Times a dispatcher classify-and-route call, recording latency and the
/// resolved intent on drop-free completion.
pub struct DispatchTimer {
    start: Instant,
}

impl DispatchTimer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn finish(self, intent: &str) {
        let elapsed = self.start.elapsed().as_secs_f64();
        if let Some(m) = metrics() {
            m.record_dispatcher_intent(intent, elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_timer_measures_elapsed() {
        let timer = DispatchTimer::start();
        std::thread::sleep(std::time::Duration::from_millis(5));
        timer.finish("casual");
    }
}
