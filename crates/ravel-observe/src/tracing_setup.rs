//! Tracing subscriber initialization.
//!
//! ```no_run
//! // Human-readable logs on stderr, filtered by RUST_LOG (default "info").
//! ravel_observe::tracing_setup::init_tracing(false).unwrap();
//! ```
//!
//! With OpenTelemetry enabled, spans are also exported to stdout through the
//! OTel SDK. Call [`shutdown_tracing`] before exit to flush them.

use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Instrumentation scope name reported to OpenTelemetry.
const TRACER_NAME: &str = "ravel";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    /// One JSON object per event, for log shippers.
    Json,
}

#[derive(Debug, Clone)]
pub struct TracingOptions {
    pub format: LogFormat,
    pub enable_otel: bool,
    /// Filter used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            enable_otel: false,
            default_filter: "info".to_string(),
        }
    }
}

/// Install the global subscriber with pretty output.
pub fn init_tracing(enable_otel: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing_with(TracingOptions {
        enable_otel,
        ..TracingOptions::default()
    })
}

/// Install the global subscriber.
///
/// Logs go to stderr so stdout stays free for program output. Fails if a
/// global subscriber is already installed.
pub fn init_tracing_with(
    options: TracingOptions,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&options.default_filter))?;

    let pretty = (options.format == LogFormat::Pretty).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
    });
    let json = (options.format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
    });

    let otel = if options.enable_otel {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer(TRACER_NAME);
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(otel)
        .with(pretty)
        .with(json)
        .try_init()?;

    Ok(())
}

/// Flush and shut down the OpenTelemetry provider. No-op when OTel is off.
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Warning: OTel tracer provider shutdown error: {e}");
        }
    }
}
