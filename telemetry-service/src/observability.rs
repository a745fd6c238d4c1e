use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Log targets enabled at info unless `RUST_LOG` says otherwise: the
/// service library and daemon plus the `src/bin` tools.
const DEFAULT_DIRECTIVES: &[&str] = &[
    "telemetry_service=info",
    "purge_readings=info",
    "simulate_telemetry=info",
];

fn default_filter() -> EnvFilter {
    DEFAULT_DIRECTIVES
        .iter()
        .fold(EnvFilter::from_default_env(), |filter, directive| {
            filter.add_directive(directive.parse().unwrap_or_else(|_| LevelFilter::INFO.into()))
        })
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .with_target(false)
        .init();
}
