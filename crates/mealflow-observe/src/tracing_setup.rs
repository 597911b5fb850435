//! Tracing subscriber initialization with structured logging and optional
//! OpenTelemetry trace export.
//!
//! # Usage
//!
//! ```no_run
//! use mealflow_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
//!
//! init_tracing(&TracingOptions { verbosity: 1, ..TracingOptions::default() }).unwrap();
//! // ...
//! shutdown_tracing();
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use std::sync::OnceLock;

/// Stores the OTel tracer provider so it can be shut down cleanly on exit.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

const CRATE_TARGETS: &[&str] = &["mealflow_core", "mealflow_infra", "mealflow_api"];

#[derive(Debug, Clone)]
pub struct TracingOptions {
    /// `-v` count from the CLI.
    pub verbosity: u8,
    /// Only errors, regardless of verbosity.
    pub quiet: bool,
    /// One JSON object per line instead of human-readable output.
    pub json: bool,
    /// Bridge spans to OpenTelemetry with the stdout exporter.
    pub otel: bool,
    /// Filter used at verbosity 0 (e.g. "info" for the server).
    pub default_directive: String,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            verbosity: 0,
            quiet: false,
            json: false,
            otel: false,
            default_directive: "warn".to_string(),
        }
    }
}

/// Filter directive for the given options, ignoring `RUST_LOG`.
pub fn filter_directive(options: &TracingOptions) -> String {
    if options.quiet {
        return "error".to_string();
    }
    match options.verbosity {
        0 => options.default_directive.clone(),
        1 => {
            let crates: Vec<String> = CRATE_TARGETS.iter().map(|t| format!("{t}=debug")).collect();
            format!("info,{}", crates.join(","))
        }
        _ => "trace".to_string(),
    }
}

/// Initialize the global tracing subscriber.
///
/// - `RUST_LOG` wins over the CLI-derived filter when set.
/// - Installs a `fmt` layer, human-readable or JSON.
/// - When `otel` is set, additionally bridges tracing spans to OpenTelemetry
///   using a stdout exporter.
///
/// # Errors
///
/// Returns an error if the global subscriber has already been set.
pub fn init_tracing(options: &TracingOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directive(options)));

    let human_layer = (!options.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(options.verbosity > 0)
            .with_writer(std::io::stderr)
    });
    let json_layer = options.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
    });

    let otel_layer = if options.otel {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("mealflow");

        // Store the provider for shutdown and register it globally.
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);

        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(human_layer)
        .with(json_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(())
}

/// Flush pending traces and shut down the OpenTelemetry tracer provider.
///
/// Safe to call even when OTel was not enabled (no-op in that case).
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Warning: OTel tracer provider shutdown error: {e}");
        }
    }
}
