use std::fs;
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Directory for the rolling JSON log, overridable with `BREVET_SYNC_LOG_DIR`
const DEFAULT_LOG_DIR: &str = "logs";

/// Console plus daily JSON file logging for the CLI.
pub fn init_logging() {
    let dir = std::env::var("BREVET_SYNC_LOG_DIR").unwrap_or_else(|_| DEFAULT_LOG_DIR.to_string());
    init_logging_in(Path::new(&dir));
}

pub fn init_logging_in(dir: &Path) {
    let _ = fs::create_dir_all(dir);

    let file_appender = tracing_appender::rolling::daily(dir, "brevet_sync.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    // stderr, so stdout only carries the run summary
    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("brevet_sync=info,warn"));

    // A second initialisation (tests, embedding) keeps the first subscriber
    if tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .is_ok()
    {
        // Flush on exit needs the guard for the whole process lifetime
        std::mem::forget(guard);
    }
}
