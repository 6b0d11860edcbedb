use dirs::home_dir;
use std::{env, path::PathBuf, sync::Once};
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_DIR_NAME: &str = ".trip_ledger";
const DEFAULT_DIRECTIVE: &str = "trip_ledger=info";

static TRACING_INIT: Once = Once::new();

/// Initializes the global tracing subscriber. `RUST_LOG` wins over `directive`.
pub fn init_tracing(directive: Option<&str>) {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| build_filter(directive));

        // Another subscriber may already be installed by the host application.
        let _ = fmt().with_env_filter(filter).try_init();
    });
}

/// Parses `directive`, falling back to `trip_ledger=info` when absent or invalid.
pub fn build_filter(directive: Option<&str>) -> EnvFilter {
    directive
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Returns the application data directory, defaulting to `~/.trip_ledger`.
pub fn app_data_dir() -> PathBuf {
    if let Some(custom) = env::var_os("TRIP_LEDGER_HOME") {
        return PathBuf::from(custom);
    }
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DIR_NAME)
}
