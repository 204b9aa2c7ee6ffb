//! Logging and OpenTelemetry export for the queue CLI.
//!
//! Log lines always go to stderr, keeping stdout for command output. When an
//! OTLP endpoint is configured, store spans and queue metrics are exported
//! too. Log records are not shipped: the stderr stream is the log sink.
//!
//! A CLI invocation lives for one command, far shorter than any batch or
//! metric export interval, so the caller must finish with
//! [`Telemetry::shutdown`] to push out whatever the exporters still hold.

pub mod metrics;
pub mod store;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig as _;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::error::{Error, Result};

const TRACER_NAME: &str = "repair-queue";

/// Configuration for telemetry initialization.
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint (e.g. "http://localhost:4317"). `None` means
    /// stderr logging only.
    pub endpoint: Option<String>,
    /// The service name reported on exported spans and metrics.
    pub service_name: String,
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info").
    pub log_level: String,
}

/// Handle on the installed telemetry. Hand it back via [`shutdown`](Self::shutdown).
#[must_use = "call shutdown() before exit or buffered spans and metrics are lost"]
pub struct Telemetry {
    export: Option<OtlpExport>,
}

struct OtlpExport {
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

impl Telemetry {
    /// Flush and stop the OTLP exporters. A no-op for stderr-only logging.
    ///
    /// Both providers are shut down even if the first one fails; the first
    /// failure is returned.
    pub fn shutdown(self) -> Result<()> {
        let Some(export) = self.export else {
            return Ok(());
        };
        let metrics = export.meter_provider.shutdown();
        let traces = export.tracer_provider.shutdown();
        metrics.map_err(|e| Error::Other(format!("metric export shutdown failed: {e}")))?;
        traces.map_err(|e| Error::Other(format!("span export shutdown failed: {e}")))?;
        Ok(())
    }
}

/// Install the global tracing subscriber and, if configured, the OTLP
/// span and metric pipelines.
///
/// # Errors
///
/// Fails if an OTLP exporter cannot be built or a global subscriber is
/// already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<Telemetry> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let stderr = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr);

    let Some(endpoint) = config.endpoint else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr)
            .try_init()
            .map_err(subscriber_error)?;
        return Ok(Telemetry { export: None });
    };

    let resource = Resource::builder()
        .with_service_name(config.service_name)
        .with_attribute(opentelemetry::KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
            env!("CARGO_PKG_VERSION"),
        ))
        .build();

    let tracer_provider = span_pipeline(&endpoint, resource.clone())?;
    let meter_provider = metric_pipeline(&endpoint, resource)?;
    opentelemetry::global::set_meter_provider(meter_provider.clone());

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(tracing_opentelemetry::layer().with_tracer(tracer_provider.tracer(TRACER_NAME)))
        .try_init()
        .map_err(subscriber_error)?;

    tracing::debug!(%endpoint, "exporting spans and metrics over OTLP");
    Ok(Telemetry {
        export: Some(OtlpExport {
            tracer_provider,
            meter_provider,
        }),
    })
}

fn span_pipeline(endpoint: &str, resource: Resource) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| Error::Other(format!("failed to create OTLP span exporter: {e}")))?;
    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

fn metric_pipeline(endpoint: &str, resource: Resource) -> Result<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| Error::Other(format!("failed to create OTLP metric exporter: {e}")))?;
    Ok(SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .with_resource(resource)
        .build())
}

fn subscriber_error(e: tracing_subscriber::util::TryInitError) -> Error {
    Error::Other(format!("failed to init tracing subscriber: {e}"))
}
