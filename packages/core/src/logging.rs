use tracing_subscriber::{fmt, EnvFilter};

/// Directives used when `RUST_LOG` is unset. sqlx logs every statement at
/// `info`, which drowns out custody events on a busy shop floor.
const DEFAULT_DIRECTIVES: &str = "info,sqlx=warn";

/// Install the global subscriber. Call once, before anything logs.
///
/// `RUST_LOG=toolroom_custody=debug` also shows rule passes that found
/// nothing to do.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    tracing::info!("Logging initialized ({})", env!("CARGO_PKG_NAME"));
}
