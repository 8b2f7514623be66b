//! Telemetry initialization.
//!
//! Controlled by two environment variables:
//! - `GEOMERGE_LOG`: an `EnvFilter` directive (default `warn`), e.g.
//!   `GEOMERGE_LOG=geomerge_core=debug`
//! - `GEOMERGE_LOG_FORMAT`: `json` for JSON spans/events, anything else for
//!   human-readable lines
//!
//! Everything goes to stderr so that reports on stdout stay parseable.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Filter directive variable.
pub const LOG_ENV: &str = "GEOMERGE_LOG";
/// Output format variable.
pub const LOG_FORMAT_ENV: &str = "GEOMERGE_LOG_FORMAT";

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global subscriber. Call once, early in `main()`.
pub fn init() {
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        init_json();
    } else {
        init_text();
    }
}

/// JSON spans/events to stderr via tracing-subscriber's JSON formatter.
fn init_json() {
    tracing_subscriber::registry()
        .with(filter())
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE),
        )
        .init();
}

fn init_text() {
    tracing_subscriber::registry()
        .with(filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
