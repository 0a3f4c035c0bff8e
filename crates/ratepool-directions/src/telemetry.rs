//! # Telemetry
//!
//! Console logging is always installed by [`init_telemetry`]. On top of it,
//! OpenTelemetry export is opt-in through cargo features.
//!
//! ## Feature matrix
//!
//! - `tracing`: emit `tracing` events from the dispatcher and the worker pool,
//!   and export spans via OpenTelemetry.
//! - `metrics`: export lookup metrics via OpenTelemetry.
//! - `stdout`: attach the stdout exporter. Requires `tracing` or `metrics`.
//!   Exported spans and metrics are written to stdout, interleaved with the
//!   binary's JSON result lines. Meant for local debugging only.
//!
//! ## Span behavior
//!
//! - Spans around `get_distance` and the batch calls are exported to any
//!   enabled backend.
//! - Events outside of a span are only shown in log output.
//!
//! ## Metrics
//!
//! - `lookups`: lookups submitted.
//! - `lookup_errors`: lookups that resolved to an error.
//! - `lookups_inflight`: lookups submitted whose caller is still waiting.
//! - `lookup_duration` (ms): submit-to-result latency, including time spent
//!   queued and waiting for the rate limiter.
//! - `batch_size`: trips per batch call.
//!
//! ## Example usage
//!
//! ```bash
//! cargo run --bin directions --features tracing,metrics,stdout -- 40.7,-74.0:40.6,-73.9
//! ```

// Disallow using `stdout` without `tracing` or `metrics`
#[cfg(all(feature = "stdout", not(any(feature = "tracing", feature = "metrics"))))]
compile_error!(
    "The 'stdout' feature requires at least one of 'tracing' or 'metrics' to be enabled."
);

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_semantic_conventions as semvcns;

#[cfg(feature = "tracing")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::propagation::TraceContextPropagator;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::trace as sdktrace;

#[cfg(any(feature = "metrics", feature = "tracing"))]
const SERVICE_NAME: &str = "ratepool-directions";

pub struct TelemetryProviders {
    #[cfg(feature = "tracing")]
    pub tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes and shuts down the exporters. Errors are reported on stderr
    /// since the subscriber may already be gone.
    pub fn shutdown(self) {
        #[cfg(feature = "tracing")]
        {
            if let Err(err) = self.tracer_provider.force_flush() {
                eprintln!("Error flushing traces: {err:#?}");
            }
            if let Err(err) = self.tracer_provider.shutdown() {
                eprintln!("Error shutting down tracer: {err:#?}");
            }
        }

        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

/// Installs the global subscriber and, depending on features, the
/// OpenTelemetry tracer and meter providers.
///
/// Log output goes to stderr so stdout stays machine-readable, unless the
/// `stdout` feature adds its exporters there too.
pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "tracing")]
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    #[cfg(feature = "tracing")]
    let tracer_provider = init_tracer();

    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics();

    #[cfg(any(feature = "metrics", feature = "tracing"))]
    let scope = InstrumentationScope::builder(SERVICE_NAME)
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build();

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339()),
        );

    #[cfg(feature = "tracing")]
    let registry = {
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer_with_scope(scope.clone()))
                .with_error_records_to_exceptions(true),
        )
    };

    #[cfg(feature = "metrics")]
    let registry = {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let meter = opentelemetry::global::meter_with_scope(scope);
        init_metric_handles(&meter);

        registry.with(tracing_opentelemetry::MetricsLayer::new(
            meter_provider.clone(),
        ))
    };

    registry.try_init()?;

    Ok(TelemetryProviders {
        #[cfg(feature = "tracing")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(any(feature = "metrics", feature = "tracing"))]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics() -> sdkmetrics::SdkMeterProvider {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::MetricExporter;
        let exporter = MetricExporter::default();
        let reader = sdkmetrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(5))
            .build();

        builder.with_reader(reader)
    };

    builder.build()
}

#[cfg(feature = "tracing")]
fn init_tracer() -> sdktrace::SdkTracerProvider {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::SpanExporter;
        let exporter = SpanExporter::default();
        let batch = sdktrace::BatchSpanProcessor::builder(exporter)
            .with_batch_config(
                sdktrace::BatchConfigBuilder::default()
                    .with_scheduled_delay(std::time::Duration::from_secs(5))
                    .with_max_queue_size(2048)
                    .build(),
            )
            .build();
        builder.with_span_processor(batch)
    };

    builder.build()
}

#[cfg(feature = "metrics")]
static LOOKUPS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static LOOKUP_ERRORS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static LOOKUPS_INFLIGHT: OnceLock<UpDownCounter<i64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static LOOKUP_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static BATCH_SIZE: OnceLock<Histogram<f64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: &Meter) {
    let _ = LOOKUPS.set(
        meter
            .u64_counter("lookups")
            .with_description("Distance lookups submitted")
            .build(),
    );

    let _ = LOOKUP_ERRORS.set(
        meter
            .u64_counter("lookup_errors")
            .with_description("Distance lookups that resolved to an error")
            .build(),
    );

    let _ = LOOKUPS_INFLIGHT.set(
        meter
            .i64_up_down_counter("lookups_inflight")
            .with_description("Lookups submitted whose caller is still waiting")
            .build(),
    );

    let _ = LOOKUP_DURATION_MS.set(
        meter
            .f64_histogram("lookup_duration")
            .with_unit("ms")
            .with_description("Submit-to-result latency of a lookup")
            .build(),
    );

    let _ = BATCH_SIZE.set(
        meter
            .f64_histogram("batch_size")
            .with_description("Trips per batch lookup")
            .build(),
    );
}

// No-ops when metrics are disabled
#[cfg(feature = "metrics")]
pub fn increment_lookups() {
    if let Some(counter) = LOOKUPS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_lookups() {}

#[cfg(feature = "metrics")]
pub fn increment_lookup_errors() {
    if let Some(counter) = LOOKUP_ERRORS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_lookup_errors() {}

#[cfg(feature = "metrics")]
pub fn increment_lookups_inflight() {
    if let Some(counter) = LOOKUPS_INFLIGHT.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_lookups_inflight() {}

#[cfg(feature = "metrics")]
pub fn decrement_lookups_inflight() {
    if let Some(counter) = LOOKUPS_INFLIGHT.get() {
        counter.add(-1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn decrement_lookups_inflight() {}

#[cfg(feature = "metrics")]
pub fn record_lookup_duration(duration_ms: f64) {
    if let Some(histogram) = LOOKUP_DURATION_MS.get() {
        histogram.record(duration_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_lookup_duration(_duration_ms: f64) {}

#[cfg(feature = "metrics")]
pub fn record_batch_size(count: f64) {
    if let Some(histogram) = BATCH_SIZE.get() {
        histogram.record(count, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_batch_size(_count: f64) {}
