use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset: `-v` raises our own crate to debug, `-vv` to trace.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "info,eventlog_sync=debug",
        _ => "info,eventlog_sync=trace",
    }
}

/// Logs go to stderr so stdout only carries command output.
pub fn init(verbosity: u8) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_by_verbosity() {
        assert_eq!(default_directive(0), "info");
        assert!(default_directive(1).contains("eventlog_sync=debug"));
        assert!(default_directive(5).contains("eventlog_sync=trace"));
    }
}
