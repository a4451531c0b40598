use once_cell::sync::OnceCell;
use tracing_subscriber::{EnvFilter, fmt};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Allocation events at debug are the useful signal when diagnosing an
/// auction; everything else stays at info unless `RUST_LOG` overrides.
const DEFAULT_DIRECTIVES: &str = "info,allocation=debug";

pub fn init_logger(service_name: &'static str) {
    LOGGER_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

        fmt().with_env_filter(filter).with_target(true).init();

        tracing::info!(service = service_name, "logger initialized");
    });
}
