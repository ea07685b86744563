//! Logging utilities for binaries that embed the multi-store.
//!
//! The store crate itself only emits `tracing` events; this crate is what
//! a binary calls once at startup to actually install a subscriber.

pub use tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};
pub use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber with structured JSON output.
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .json(),
        )
        .try_init()?;

    Ok(())
}

/// Initialize tracing with an explicit level filter, overriding `RUST_LOG`.
pub fn init_tracing_with_level(
    level: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(EnvFilter::new(level))
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .json(),
        )
        .try_init()?;

    Ok(())
}

/// Initialize tracing for tests: human-readable output on the test writer.
pub fn init_tracing_test() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(EnvFilter::new("debug"))
        .with(fmt::layer().with_test_writer())
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_macros() {
        info!("test info message");
        debug!("test debug message");
        warn!("test warning message");
        error!("test error message");
    }

    #[test]
    #[tracing::instrument]
    fn test_instrument_attribute() {
        info!("this function is instrumented");
    }
}
