use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing with console and Sentry layers.
///
/// - Console: written to stderr so command output stays clean; compact by
///   default, JSON lines when `LOG_FORMAT=json`
/// - Sentry: captures ERROR events as issues, WARN as breadcrumbs
/// - Default level: INFO (DEBUG for this crate), override via RUST_LOG env
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,routine_advisor=debug"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let compact_layer = (!json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .compact()
    });
    let json_layer = json.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(false)
    });

    // No-op when Sentry DSN is not configured.
    let sentry_layer = sentry_tracing::layer().event_filter(|meta| match *meta.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(compact_layer)
        .with(json_layer)
        .with(sentry_layer)
        .try_init();

    tracing::debug!(json, "Tracing initialized");
}
