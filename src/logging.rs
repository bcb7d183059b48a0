use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `BGG_RELAY_LOG=pretty` switches from JSON lines to the human format.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let pretty = std::env::var("BGG_RELAY_LOG").map(|v| v == "pretty").unwrap_or(false);
    let registry = tracing_subscriber::registry().with(filter);
    if pretty {
        registry.with(fmt::layer().with_target(true)).init();
    } else {
        registry.with(fmt::layer().json()).init();
    }
}
