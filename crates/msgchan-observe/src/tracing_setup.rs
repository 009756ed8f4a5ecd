//! Subscriber setup for the `msgchan` binary.
//!
//! Channel internals log through `tracing` only; this module decides where
//! those events go. Logs are written to stderr so command output on stdout
//! (including `--json` reports) stays machine-readable.
//!
//! ```no_run
//! use msgchan_observe::tracing_setup::{LogOptions, init_tracing};
//!
//! // Dispatch and settlement events at debug, text format
//! init_tracing(&LogOptions::new("info,msgchan=debug")).unwrap();
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use std::sync::OnceLock;

/// Kept so `shutdown_tracing` can flush spans on exit.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// How the binary wants its logs.
#[derive(Debug, Clone)]
pub struct LogOptions<'a> {
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: &'a str,
    /// Emit one JSON object per event instead of text.
    pub json: bool,
    /// Also export `dispatch` spans through OpenTelemetry (stdout exporter).
    pub otel: bool,
}

impl<'a> LogOptions<'a> {
    pub fn new(default_filter: &'a str) -> Self {
        Self {
            default_filter,
            json: false,
            otel: false,
        }
    }
}

/// Map `-v` counts and `--quiet` to a default filter.
pub fn filter_for_verbosity(verbose: u8, quiet: bool) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 => "warn",
        1 => "info,msgchan=debug",
        _ => "trace",
    }
}

fn build_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install the global subscriber.
///
/// Span close events are logged so each `dispatch` span reports how long its
/// listeners ran.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(opts: &LogOptions<'_>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let text_layer = (!opts.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
    });
    let json_layer = opts.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE)
    });

    let otel_layer = opts.otel.then(|| {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("msgchan");
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);
        tracing_opentelemetry::layer().with_tracer(tracer)
    });

    tracing_subscriber::registry()
        .with(build_filter(opts.default_filter))
        .with(otel_layer)
        .with(text_layer)
        .with(json_layer)
        .try_init()?;

    Ok(())
}

/// Flush and shut down the OpenTelemetry provider, if one was installed.
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Warning: OTel tracer provider shutdown error: {e}");
        }
    }
}
