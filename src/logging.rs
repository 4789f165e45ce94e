use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Install the global tracing subscriber: `RUST_LOG`-style env filtering,
/// compact UTC-timestamped lines, non-blocking stdout writer.
///
/// The returned guard must be held for the life of the process; dropping it
/// early can lose buffered log lines.
pub fn init_logging() -> WorkerGuard {
    let filter: EnvFilter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let formatting_layer = fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_target(true)
        .compact()
        .with_ansi(false)
        .with_writer(non_blocking_writer);

    let subscriber = Registry::default().with(filter).with(formatting_layer);

    tracing::subscriber::set_global_default(subscriber)
        .expect("failed to set global tracing subscriber");

    guard
}
