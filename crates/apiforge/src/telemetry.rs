//! Tracing subscriber setup for the apiforge binaries.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter from `RUST_LOG` when set, otherwise from the `APIFORGE_LOG` level.
fn build_filter(rust_log: Option<&str>, level: Option<&str>) -> EnvFilter {
    if let Some(directives) = rust_log {
        return EnvFilter::new(directives);
    }

    let base_level = match level {
        Some("debug") => "debug",
        Some("trace") => "trace",
        Some("warn") | Some("warning") => "warn",
        Some("error") => "error",
        _ => "info",
    };

    EnvFilter::new(format!(
        "apiforge={level},apiforge_schema={level}",
        level = base_level
    ))
}

/// Install the global subscriber. `LOG_FORMAT=json` switches to JSON lines.
///
/// Logs go to stderr so `apiforge generate` output can be piped.
pub fn init_tracing() {
    let rust_log = std::env::var("RUST_LOG").ok();
    let level = std::env::var("APIFORGE_LOG").ok();
    let filter = build_filter(rust_log.as_deref(), level.as_deref());

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}
